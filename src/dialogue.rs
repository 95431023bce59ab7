//! Turn-bounded recommendation dialogue.
//!
//! [`DialogueController`] is a synchronous state machine. Each backend call is
//! split into `begin_*`, which validates input, updates the conversation and
//! marks the controller busy, and [`DialogueController::finish`], which
//! applies the reply. Every pending step carries the generation it was
//! issued in; a restart bumps the generation so a late reply is dropped.
//! [`DialogueHandle`] drives the steps against a backend on a spawned task,
//! without holding the controller lock across the call.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::{RecommendationBackend, RecommendationItem};
use crate::constants::{
    CLOSING_MESSAGE, FOLLOW_UP_QUESTION_FALLBACK, MAX_QUESTIONS, OPENING_QUESTION_FALLBACK,
};
use crate::conversation::{Conversation, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingFirstQuestion,
    Asking { turns_asked: u32 },
    Complete,
}

/// The backend request a step needs answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueRequest {
    OpeningQuestion,
    FollowUpQuestion(Vec<Turn>),
    Recommendations(Vec<Turn>),
}

impl DialogueRequest {
    /// Runs the request, substituting the fixed fallback for any failure.
    pub async fn resolve(&self, backend: &dyn RecommendationBackend) -> DialogueReply {
        match self {
            DialogueRequest::OpeningQuestion => match backend.opening_question().await {
                Ok(question) => DialogueReply::Question(question),
                Err(e) => {
                    warn!(error = %e, "Opening question failed, using fallback");
                    DialogueReply::Question(OPENING_QUESTION_FALLBACK.to_string())
                }
            },
            DialogueRequest::FollowUpQuestion(transcript) => {
                match backend.follow_up_question(transcript).await {
                    Ok(question) => DialogueReply::Question(question),
                    Err(e) => {
                        warn!(error = %e, "Follow-up question failed, using fallback");
                        DialogueReply::Question(FOLLOW_UP_QUESTION_FALLBACK.to_string())
                    }
                }
            }
            DialogueRequest::Recommendations(transcript) => {
                match backend.recommendations(transcript).await {
                    Ok(items) => DialogueReply::Recommendations(items),
                    Err(e) => {
                        // Completes with no books; kept for compatibility.
                        warn!(error = %e, "Recommendations failed, completing with none");
                        DialogueReply::Recommendations(Vec::new())
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueReply {
    Question(String),
    Recommendations(Vec<RecommendationItem>),
}

/// A request issued by the controller and not yet finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    generation: u64,
    pub request: DialogueRequest,
}

#[derive(Debug, Clone)]
pub struct DialogueController {
    state: DialogueState,
    conversation: Conversation,
    recommendations: Vec<RecommendationItem>,
    busy: bool,
    generation: u64,
}

impl Default for DialogueController {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueController {
    pub fn new() -> Self {
        Self::with_state(DialogueState::AwaitingFirstQuestion, Conversation::new())
    }

    /// Builds an idle controller positioned at an arbitrary state.
    pub fn with_state(state: DialogueState, conversation: Conversation) -> Self {
        Self {
            state,
            conversation,
            recommendations: Vec::new(),
            busy: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn recommendations(&self) -> &[RecommendationItem] {
        &self.recommendations
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_complete(&self) -> bool {
        self.state == DialogueState::Complete
    }

    /// Clears everything and asks for the opening question. Always accepted,
    /// also while another step is outstanding.
    pub fn begin_start(&mut self) -> PendingStep {
        self.generation += 1;
        self.state = DialogueState::AwaitingFirstQuestion;
        self.conversation = Conversation::new();
        self.recommendations.clear();
        self.busy = true;
        debug!(generation = self.generation, "Dialogue started");
        PendingStep {
            generation: self.generation,
            request: DialogueRequest::OpeningQuestion,
        }
    }

    /// Records the user's answer and returns the next request, or `None` when
    /// the answer is dropped.
    pub fn begin_submit(&mut self, text: &str) -> Option<PendingStep> {
        if text.trim().is_empty() || self.busy {
            return None;
        }
        let turns_asked = match self.state {
            DialogueState::Asking { turns_asked } => turns_asked,
            DialogueState::AwaitingFirstQuestion | DialogueState::Complete => return None,
        };

        self.conversation.push(Turn::user(text));
        self.busy = true;
        let transcript = self.conversation.transcript();
        let request = if turns_asked < MAX_QUESTIONS {
            DialogueRequest::FollowUpQuestion(transcript)
        } else {
            DialogueRequest::Recommendations(transcript)
        };
        Some(PendingStep {
            generation: self.generation,
            request,
        })
    }

    /// Applies a reply. Returns `false` if the step was abandoned by a restart.
    pub fn finish(&mut self, step: PendingStep, reply: DialogueReply) -> bool {
        if step.generation != self.generation {
            debug!(
                stale = step.generation,
                current = self.generation,
                "Ignoring reply from an abandoned dialogue"
            );
            return false;
        }

        match (self.state, reply) {
            (DialogueState::AwaitingFirstQuestion, DialogueReply::Question(question)) => {
                self.conversation.push(Turn::ai(question));
                self.state = DialogueState::Asking { turns_asked: 1 };
            }
            (DialogueState::Asking { turns_asked }, DialogueReply::Question(question)) => {
                self.conversation.push(Turn::ai(question));
                self.state = DialogueState::Asking {
                    turns_asked: turns_asked + 1,
                };
            }
            (DialogueState::Asking { .. }, DialogueReply::Recommendations(items)) => {
                info!(count = items.len(), "Dialogue complete");
                self.recommendations = items;
                self.conversation.push(Turn::ai(CLOSING_MESSAGE));
                self.state = DialogueState::Complete;
            }
            (state, reply) => {
                warn!(?state, ?reply, "Reply does not fit the dialogue state, ignoring");
            }
        }
        self.busy = false;
        true
    }

    pub fn snapshot(&self) -> DialogueSnapshot {
        DialogueSnapshot {
            generation: self.generation,
            state: self.state,
            busy: self.busy,
            conversation: self.conversation.clone(),
            recommendations: self.recommendations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueSnapshot {
    /// Bumped by every start, so a finished set is identified by it.
    #[serde(skip)]
    pub generation: u64,
    pub state: DialogueState,
    pub busy: bool,
    pub conversation: Conversation,
    pub recommendations: Vec<RecommendationItem>,
}

/// Runs a step on its own task and waits for it. Once begun, a step reaches
/// `finish` even if the caller is dropped, so the busy flag always clears.
pub(crate) async fn detach<F>(work: F) -> Option<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(output) => Some(output),
        Err(e) => {
            error!(error = %e, "Controller step task failed");
            None
        }
    }
}

/// Shares one controller between concurrent callers.
#[derive(Clone)]
pub struct DialogueHandle {
    controller: Arc<Mutex<DialogueController>>,
    backend: Arc<dyn RecommendationBackend>,
    started: Arc<Mutex<bool>>,
}

impl DialogueHandle {
    pub fn new(backend: Arc<dyn RecommendationBackend>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(DialogueController::new())),
            backend,
            started: Arc::new(Mutex::new(false)),
        }
    }

    async fn run(&self, step: PendingStep) -> bool {
        let reply = step.request.resolve(self.backend.as_ref()).await;
        self.controller.lock().await.finish(step, reply)
    }

    pub async fn start(&self) {
        let this = self.clone();
        detach(async move {
            *this.started.lock().await = true;
            let step = this.controller.lock().await.begin_start();
            this.run(step).await;
        })
        .await;
    }

    pub async fn reset(&self) {
        info!("Restarting recommendation dialogue");
        self.start().await;
    }

    /// Starts the dialogue if nothing has started it yet.
    pub async fn ensure_started(&self) {
        let this = self.clone();
        detach(async move {
            let first = {
                let mut started = this.started.lock().await;
                !std::mem::replace(&mut *started, true)
            };
            if first {
                let step = this.controller.lock().await.begin_start();
                this.run(step).await;
            }
        })
        .await;
    }

    /// Returns whether the answer was accepted.
    pub async fn submit(&self, text: &str) -> bool {
        let this = self.clone();
        let text = text.to_string();
        detach(async move {
            let step = this.controller.lock().await.begin_submit(&text);
            match step {
                Some(step) => {
                    this.run(step).await;
                    true
                }
                None => {
                    debug!("Answer dropped");
                    false
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> DialogueSnapshot {
        self.controller.lock().await.snapshot()
    }
}
