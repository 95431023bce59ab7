use thiserror::Error;

/// Failures talking to the generative backend. Controllers never show these
/// to the user; each one is swapped for a fixed fallback.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("backend response contained no text")]
    EmptyResponse,
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Malformed(e.to_string())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
