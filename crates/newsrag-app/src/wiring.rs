//! Collaborator construction for the composition root.
//!
//! Anything that needs an API key is created lazily or degraded to a
//! stand-in that fails on use, so commands that never touch a collaborator
//! (querying a persisted snapshot, for one) run without credentials.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use newsrag_core::config::{
    api_key_from_env, expand_home, AnswerConfig, EmbeddingConfig, ExpansionConfig, NewsConfig,
    RetryConfig,
};
use newsrag_core::error::Result;
use newsrag_core::types::RawDocument;
use newsrag_core::{CorpusSource, JsonCorpus};
use newsrag_llm::{
    GenerationRequest, LlmError, OpenAiChatClient, RetryPolicy, RetryingGenerator, TextGenerator,
};
use newsrag_news::NewsApiClient;
use newsrag_vector::{BagOfWordsEmbedding, DynEmbeddingService, OnnxEmbeddingService};

/// Load the ONNX sentence embedder, or fall back to hashed bag-of-words
/// vectors of the configured dimension when the model files are missing.
///
/// The service's `model_id` is recorded in every snapshot it builds, so a
/// snapshot built with the model is refused, not silently misranked, when
/// the fallback is serving.
pub fn embedder(config: &EmbeddingConfig) -> Arc<dyn DynEmbeddingService> {
    let model_dir = expand_home(&config.model_dir);
    match OnnxEmbeddingService::from_directory(&model_dir) {
        Ok(service) => {
            let service = service.with_model_id(format!("onnx:{}", config.model_name));
            if service.dimensions() != config.dimensions {
                warn!(
                    configured = config.dimensions,
                    actual = service.dimensions(),
                    "Embedding model dimension differs from configuration"
                );
            }
            info!(model = %config.model_name, "Using ONNX embedding model");
            Arc::new(service)
        }
        Err(e) => {
            warn!(
                dir = %model_dir.display(),
                error = %e,
                "Embedding model unavailable, using bag-of-words embeddings"
            );
            Arc::new(BagOfWordsEmbedding::new(config.dimensions))
        }
    }
}

/// Chat-completions client with retries, reading its key from `api_key_env`.
pub fn model_client(
    base_url: &str,
    api_key_env: &str,
    model: &str,
    retry: &RetryConfig,
) -> Arc<dyn TextGenerator> {
    let policy = RetryPolicy::from(retry);
    let client = api_key_from_env(api_key_env)
        .map_err(|e| LlmError::Config(e.to_string()))
        .and_then(|key| OpenAiChatClient::new(base_url, key, model, policy.timeout));
    match client {
        Ok(client) => Arc::new(RetryingGenerator::new(client, policy)),
        Err(e) => {
            warn!(model, error = %e, "Model client not configured");
            Arc::new(UnconfiguredGenerator {
                reason: e.to_string(),
            })
        }
    }
}

pub fn expansion_client(config: &ExpansionConfig, retry: &RetryConfig) -> Arc<dyn TextGenerator> {
    model_client(&config.base_url, &config.api_key_env, &config.model, retry)
}

pub fn answer_client(config: &AnswerConfig, retry: &RetryConfig) -> Arc<dyn TextGenerator> {
    model_client(&config.base_url, &config.api_key_env, &config.model, retry)
}

/// Stand-in for a model client that could not be built.
#[derive(Debug)]
pub struct UnconfiguredGenerator {
    reason: String,
}

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> std::result::Result<String, LlmError> {
        Err(LlmError::Config(self.reason.clone()))
    }
}

/// NewsAPI source that builds its client on first use.
#[derive(Debug, Clone)]
pub struct NewsApiSource {
    config: NewsConfig,
}

impl NewsApiSource {
    pub fn new(config: NewsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CorpusSource for NewsApiSource {
    async fn documents(&self) -> Result<Vec<RawDocument>> {
        NewsApiClient::from_config(&self.config)?.documents().await
    }
}

/// A local JSON corpus when `corpus` is given, NewsAPI otherwise.
pub fn corpus_source(corpus: Option<&Path>, news: &NewsConfig) -> Box<dyn CorpusSource> {
    match corpus {
        Some(path) => Box::new(JsonCorpus::new(PathBuf::from(path))),
        None => Box::new(NewsApiSource::new(news.clone())),
    }
}
