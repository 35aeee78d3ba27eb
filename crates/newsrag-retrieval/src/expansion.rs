//! Query expansion: ask a text generator for exactly N short search queries
//! that stand in for an article at retrieval time.

use std::sync::Arc;

use tracing::debug;

use newsrag_core::config::ExpansionConfig;
use newsrag_core::error::{NewsRagError, Result};
use newsrag_core::types::EXPANSION_STRIDE;
use newsrag_llm::{ChatMessage, GenerationRequest, TextGenerator};

/// Words taken from the start of an article to fill missing expansion slots.
pub const FALLBACK_QUERY_WORDS: usize = 6;

/// Generates the N expansion queries for an article.
pub struct QueryExpansionGenerator {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
    max_tokens: u32,
}

impl QueryExpansionGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::from_config(generator, &ExpansionConfig::default())
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &ExpansionConfig) -> Self {
        Self {
            generator,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Generate exactly N queries for `article_text`.
    ///
    /// Fewer than N usable lines is a `MalformedExpansion` error; a short
    /// block is never returned.
    pub async fn expand(&self, article_text: &str) -> Result<Vec<String>> {
        let queries = self.expand_lenient(article_text).await?;
        if queries.len() < EXPANSION_STRIDE {
            return Err(NewsRagError::MalformedExpansion {
                expected: EXPANSION_STRIDE,
                got: queries.len(),
            });
        }
        Ok(queries)
    }

    /// Generate and parse, returning however many usable queries (at most N)
    /// the model produced. Callers decide what to do with a short result.
    pub async fn expand_lenient(&self, article_text: &str) -> Result<Vec<String>> {
        let request = GenerationRequest::new(vec![ChatMessage::user(build_prompt(article_text))])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let raw = self.generator.generate(&request).await?;
        let queries = parse_queries(&raw);
        debug!(count = queries.len(), "Parsed expansion queries");
        Ok(queries)
    }
}

/// The expansion prompt for one article.
pub fn build_prompt(article_text: &str) -> String {
    format!(
        "Generate EXACTLY {n} short search queries for the following news article.\n\
         Rules:\n\
         - Each query must be 3-6 words.\n\
         - Must look like a realistic search query.\n\
         - No bullet points.\n\
         - No numbering.\n\
         - Output ONLY the queries separated by newlines.\n\
         \n\
         Article:\n\
         {article_text}\n\
         \n\
         Output:\n",
        n = EXPANSION_STRIDE,
    )
}

/// Split model output into at most N non-empty trimmed lines.
pub fn parse_queries(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(EXPANSION_STRIDE)
        .map(str::to_string)
        .collect()
}

/// Fill a short expansion up to N queries with the article's leading words.
pub fn pad_queries(mut queries: Vec<String>, article_text: &str) -> Vec<String> {
    queries.truncate(EXPANSION_STRIDE);
    if queries.len() == EXPANSION_STRIDE {
        return queries;
    }
    let fallback = article_text
        .split_whitespace()
        .take(FALLBACK_QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    queries.resize(EXPANSION_STRIDE, fallback);
    queries
}
