//! NewsRAG LLM crate - the text generation collaborator.
//!
//! Defines the [`TextGenerator`] seam used for query expansion and answer
//! synthesis, an OpenAI-compatible HTTP client, bounded retry with backoff,
//! and a scripted mock for tests.

pub mod error;
pub mod generation;
pub mod openai;
pub mod retry;

pub use error::LlmError;
pub use generation::{ChatMessage, GenerationRequest, MockGenerator, Role, TextGenerator};
pub use openai::OpenAiChatClient;
pub use retry::{RetryPolicy, RetryingGenerator};

use std::sync::Arc;

use async_trait::async_trait;

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        (**self).generate(request).await
    }
}
