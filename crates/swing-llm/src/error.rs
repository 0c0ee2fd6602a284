//! Error types for LLM operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

#[derive(Error, Debug)]
pub enum LLMError {
    /// The backend rejected the credentials (HTTP 401/403)
    #[error("authentication rejected by {0}")]
    Unauthorized(String),

    /// HTTP 429
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body parsed but did not contain a usable completion
    #[error("malformed completion: {0}")]
    Malformed(String),

    #[error("missing configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl LLMError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Map a non-success HTTP answer from `provider`
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(provider.to_string()),
            429 => Self::RateLimited(body),
            _ => Self::Status { status, body },
        }
    }
}
