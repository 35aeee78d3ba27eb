//! Grounded answer synthesis from retrieved articles and recent history.

use std::sync::Arc;

use newsrag_core::config::AnswerConfig;
use newsrag_core::types::ChatTurn;
use newsrag_llm::{ChatMessage, GenerationRequest, LlmError, TextGenerator};

/// Placed in the prompt when retrieval found nothing.
pub const NO_CONTEXT: &str = "No context";

/// Builds answer prompts and calls the answer model.
pub struct AnswerGenerator {
    generator: Arc<dyn TextGenerator>,
    config: AnswerConfig,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: AnswerConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// The user-message prompt: system prompt, the first `context_docs`
    /// articles, the last `history_turns` turns, then the query.
    pub fn build_prompt(&self, query: &str, context: &[String], history: &[ChatTurn]) -> String {
        let context_text = context
            .iter()
            .take(self.config.context_docs)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");
        let context_text = if context_text.is_empty() {
            NO_CONTEXT
        } else {
            context_text.as_str()
        };

        let skip = history.len().saturating_sub(self.config.history_turns);
        let history_text = history[skip..]
            .iter()
            .map(|turn| format!("User: {}\nAssistant: {}", turn.query, turn.answer))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\nContext:\n{}\n\n{}\nUser: {}",
            self.config.system_prompt, context_text, history_text, query
        )
    }

    pub fn build_request(
        &self,
        query: &str,
        context: &[String],
        history: &[ChatTurn],
    ) -> GenerationRequest {
        GenerationRequest::new(vec![
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(self.build_prompt(query, context, history)),
        ])
        .with_temperature(self.config.temperature)
        .with_top_p(self.config.top_p)
        .with_max_tokens(self.config.max_tokens)
    }

    /// Generate an answer. The returned text is trimmed.
    pub async fn answer(
        &self,
        query: &str,
        context: &[String],
        history: &[ChatTurn],
    ) -> Result<String, LlmError> {
        let request = self.build_request(query, context, history);
        let text = self.generator.generate(&request).await?;
        Ok(text.trim().to_string())
    }
}
