//! Error types for the analysis core

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the data gateway could not produce a usable snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Unknown symbol, unparsable ticker or empty price history
    NotFound,
    /// Upstream throttled the request
    RateLimited,
    /// Upstream did not answer in time
    Timeout,
    /// Upstream answered with data that could not be used
    Malformed,
}

impl FailureReason {
    /// Whether the same call might succeed if attempted again later
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::RateLimited => "RateLimited",
            Self::Timeout => "Timeout",
            Self::Malformed => "Malformed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of the data gateway for one ticker
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason} for {ticker}: {detail}")]
pub struct DataFailure {
    pub ticker: String,
    pub reason: FailureReason,
    pub detail: String,
}

impl DataFailure {
    pub fn new(ticker: impl Into<String>, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            reason,
            detail: detail.into(),
        }
    }

    pub fn not_found(ticker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ticker, FailureReason::NotFound, detail)
    }

    pub fn timeout(ticker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ticker, FailureReason::Timeout, detail)
    }

    pub fn malformed(ticker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ticker, FailureReason::Malformed, detail)
    }
}

/// Errors surfaced by the analysis core
#[derive(Debug, Error)]
pub enum TraderError {
    /// Market data could not be fetched for a ticker
    #[error("Data failure: {0}")]
    Data(#[from] DataFailure),

    /// Sector identifier did not resolve to any ticker
    #[error("Unknown sector: {0}")]
    UnknownSector(String),

    /// Ranking produced an unusable score
    #[error("Ranking error: {0}")]
    Ranking(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline state was advanced out of order
    #[error("Pipeline state error: {0}")]
    State(String),

    /// Upstream service answered with an error status
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL construction error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Pattern compilation error
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text-generation backend error
    #[error("LLM error: {0}")]
    Llm(#[from] swing_llm::LLMError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, TraderError>;
