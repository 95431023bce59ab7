pub mod backend;
pub mod chat;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod cover;
pub mod dialogue;
pub mod error;
pub mod gemini;
pub mod recommendations;
pub mod repl;
pub mod web_server;

pub use backend::{ChatBackend, ChatSession, RecommendationBackend, RecommendationItem};
pub use conversation::{Conversation, Sender, Turn};
pub use error::{BackendError, BackendResult};
