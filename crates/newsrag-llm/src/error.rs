//! Error types for text generation calls.

use std::time::Duration;

use newsrag_core::error::NewsRagError;

/// Errors from a text generation collaborator.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("failed to decode model response: {0}")]
    Decode(String),
    #[error("client configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, timeouts, rate limiting, and server errors are
    /// transient; malformed requests and bad credentials are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::Timeout(_) => true,
            LlmError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            LlmError::EmptyResponse | LlmError::Decode(_) | LlmError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

impl From<LlmError> for NewsRagError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Config(msg) => NewsRagError::Config(msg),
            other => NewsRagError::Generation(other.to_string()),
        }
    }
}
