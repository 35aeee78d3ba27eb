//! The text generation collaborator seam.
//!
//! Both call sites (query expansion at index time and answer synthesis at
//! chat time) depend only on [`TextGenerator`], so transport, retry, and
//! timeout concerns stay behind this interface.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A generation request: messages plus sampling constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 256,
            top_p: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Produces text for a request. May fail with a transport or availability
/// error; callers decide whether to retry or propagate.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync>;

/// Scripted generator for tests.
///
/// Queued responses are returned first, in order; once the queue is empty
/// the fallback responder answers. Every call is counted.
pub struct MockGenerator {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Responder,
    calls: AtomicUsize,
}

impl MockGenerator {
    /// Always answer with `text`.
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    /// Answer by calling `f` with the request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Box::new(f),
            calls: AtomicUsize::new(0),
        }
    }

    /// Return the scripted results in order, then fail with `EmptyResponse`.
    pub fn with_responses(responses: Vec<Result<String, LlmError>>) -> Self {
        let generator = Self::from_fn(|_| Err(LlmError::EmptyResponse));
        if let Ok(mut queue) = generator.queue.lock() {
            queue.extend(responses);
        }
        generator
    }

    /// Always fail with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |_| Err(LlmError::Transport(message.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .queue
            .lock()
            .map_err(|e| LlmError::Transport(format!("mock queue poisoned: {}", e)))?
            .pop_front();
        match scripted {
            Some(result) => result,
            None => (self.fallback)(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user(text)])
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
        let json = serde_json::to_string(&Role::System).unwrap();
        assert_eq!(json, r#""system""#);
    }

    #[test]
    fn test_request_builders() {
        let req = request("q")
            .with_temperature(0.3)
            .with_max_tokens(60)
            .with_top_p(0.9);
        assert_eq!(req.temperature, 0.3);
        assert_eq!(req.max_tokens, 60);
        assert_eq!(req.top_p, Some(0.9));
        assert_eq!(req.last_user_content(), Some("q"));
    }

    #[tokio::test]
    async fn test_mock_constant() {
        let generator = MockGenerator::constant("answer");
        assert_eq!(generator.generate(&request("a")).await.unwrap(), "answer");
        assert_eq!(generator.generate(&request("b")).await.unwrap(), "answer");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_from_fn_sees_request() {
        let generator = MockGenerator::from_fn(|req| {
            Ok(req.last_user_content().unwrap_or_default().to_uppercase())
        });
        assert_eq!(generator.generate(&request("shout")).await.unwrap(), "SHOUT");
    }

    #[tokio::test]
    async fn test_mock_scripted_then_exhausted() {
        let generator = MockGenerator::with_responses(vec![
            Err(LlmError::Transport("flaky".into())),
            Ok("second".into()),
        ]);
        assert!(generator.generate(&request("x")).await.is_err());
        assert_eq!(generator.generate(&request("x")).await.unwrap(), "second");
        assert!(matches!(
            generator.generate(&request("x")).await,
            Err(LlmError::EmptyResponse)
        ));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let generator = MockGenerator::failing("unreachable");
        let err = generator.generate(&request("x")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
