//! Error types for the conversational session.

use newsrag_core::error::NewsRagError;

/// Errors from a chat session.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("history error: {0}")]
    History(String),
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::History(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::History(format!("malformed history file: {}", err))
    }
}

impl From<ChatError> for NewsRagError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::History(msg) => NewsRagError::History(msg),
            ChatError::EmptyMessage => NewsRagError::Config(err.to_string()),
        }
    }
}
