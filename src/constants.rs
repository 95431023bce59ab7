// Defaults for endpoints and models, overridable from the environment,
// plus the fixed texts the controllers fall back to.

use std::env;
use std::time::Duration;

lazy_static::lazy_static! {
    pub static ref GEMINI_BASE_URL: String = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
    pub static ref RECOMMENDATION_MODEL: String = env::var("RECOMMENDATION_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
    pub static ref CHAT_MODEL: String = env::var("CHAT_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
    pub static ref OPEN_LIBRARY_URL: String = env::var("OPEN_LIBRARY_URL").unwrap_or_else(|_| "https://openlibrary.org".to_string());
    pub static ref COVERS_URL: String = env::var("COVERS_URL").unwrap_or_else(|_| "https://covers.openlibrary.org".to_string());
    pub static ref PLACEHOLDER_URL: String = env::var("PLACEHOLDER_URL").unwrap_or_else(|_| "https://picsum.photos".to_string());
}

/// Upper bound on a single cover search before it counts as no result.
pub const COVER_LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);

/// Number of questions asked before recommendations are requested.
pub const MAX_QUESTIONS: u32 = 6;

/// Size of the recommendation set the backend must return.
pub const RECOMMENDATION_COUNT: usize = 3;

pub const OPENING_QUESTION_FALLBACK: &str = "I'm having a little trouble thinking of a question right now. Could you tell me about a book you've recently enjoyed?";

pub const FOLLOW_UP_QUESTION_FALLBACK: &str =
    "I seem to be stuck. Could you tell me about your favorite movie? Sometimes that helps!";

pub const CLOSING_MESSAGE: &str = "Based on our conversation, here are a few books you might love!";

pub const CHAT_GREETING: &str = "Hello! How can I help you today? Feel free to ask me anything.";

pub const CHAT_ERROR_REPLY: &str = "I'm sorry, I encountered an error. Please try again.";
