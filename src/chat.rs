// Free-form chat against a backend session.
//
// Same two-phase shape as the dialogue controller: `begin_submit` records the
// user turn and hands out the session to call, `finish` appends the reply.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatSession};
use crate::constants::{CHAT_ERROR_REPLY, CHAT_GREETING};
use crate::conversation::{Conversation, Turn};
use crate::dialogue::detach;
use crate::error::BackendResult;

/// A message accepted for sending.
pub struct PendingSend {
    generation: u64,
    session: Arc<dyn ChatSession>,
    pub text: String,
}

impl PendingSend {
    pub async fn send(&self) -> BackendResult<String> {
        self.session.send(&self.text).await
    }
}

#[derive(Default)]
pub struct ChatController {
    session: Option<Arc<dyn ChatSession>>,
    conversation: Conversation,
    busy: bool,
    generation: u64,
}

impl ChatController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Replaces the session and conversation with fresh ones.
    pub fn start(&mut self, session: Arc<dyn ChatSession>) {
        self.generation += 1;
        self.session = Some(session);
        self.conversation = Conversation::new();
        self.conversation.push(Turn::ai(CHAT_GREETING));
        self.busy = false;
        debug!(generation = self.generation, "Chat session started");
    }

    pub fn begin_submit(&mut self, text: &str) -> Option<PendingSend> {
        if text.trim().is_empty() || self.busy {
            return None;
        }
        let session = self.session.clone()?;

        self.conversation.push(Turn::user(text));
        self.busy = true;
        Some(PendingSend {
            generation: self.generation,
            session,
            text: text.to_string(),
        })
    }

    /// Appends the reply, or the apology on failure. Returns `false` when the
    /// send belonged to a discarded session.
    pub fn finish(&mut self, pending: PendingSend, reply: BackendResult<String>) -> bool {
        if pending.generation != self.generation {
            debug!("Ignoring reply from a discarded chat session");
            return false;
        }
        let text = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Chat send failed");
                CHAT_ERROR_REPLY.to_string()
            }
        };
        self.conversation.push(Turn::ai(text));
        self.busy = false;
        true
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            busy: self.busy,
            active: self.is_active(),
            conversation: self.conversation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSnapshot {
    pub busy: bool,
    pub active: bool,
    pub conversation: Conversation,
}

#[derive(Clone)]
pub struct ChatHandle {
    controller: Arc<Mutex<ChatController>>,
    backend: Arc<dyn ChatBackend>,
}

impl ChatHandle {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(ChatController::new())),
            backend,
        }
    }

    pub async fn start(&self) {
        let session = self.backend.create_session();
        self.controller.lock().await.start(session);
    }

    pub async fn reset(&self) {
        info!("Restarting chat");
        self.start().await;
    }

    pub async fn ensure_started(&self) {
        let mut controller = self.controller.lock().await;
        if !controller.is_active() {
            controller.start(self.backend.create_session());
        }
    }

    /// Returns whether the message was accepted.
    pub async fn submit(&self, text: &str) -> bool {
        let controller = self.controller.clone();
        let text = text.to_string();
        detach(async move {
            let pending = controller.lock().await.begin_submit(&text);
            let Some(pending) = pending else {
                debug!("Chat message dropped");
                return false;
            };
            let reply = pending.send().await;
            controller.lock().await.finish(pending, reply);
            true
        })
        .await
        .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        self.controller.lock().await.snapshot()
    }
}
