//! Capabilities the controllers need from the generative backend.
//!
//! Kept narrow so tests can swap in scripted doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::conversation::Turn;
use crate::error::BackendResult;

/// A single recommended book as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub synopsis: String,
}

#[async_trait]
pub trait RecommendationBackend: Send + Sync {
    async fn opening_question(&self) -> BackendResult<String>;

    async fn follow_up_question(&self, transcript: &[Turn]) -> BackendResult<String>;

    async fn recommendations(&self, transcript: &[Turn]) -> BackendResult<Vec<RecommendationItem>>;
}

/// A stateful conversation held by the backend. Only the new message is
/// passed on each send.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send(&self, text: &str) -> BackendResult<String>;
}

pub trait ChatBackend: Send + Sync {
    fn create_session(&self) -> Arc<dyn ChatSession>;
}
