use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NewsRagError, Result};

/// Top-level configuration for NewsRAG.
///
/// Loaded from `~/.newsrag/config.toml` by default. Every section is
/// optional; missing sections and fields fall back to their defaults.
/// API keys are never stored here, only the names of the environment
/// variables that carry them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsRagConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl NewsRagConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NewsRagConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NewsRagError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Directory holding the four snapshot files.
    pub fn index_dir(&self) -> PathBuf {
        self.general.resolved_data_dir().join(&self.index.dir)
    }

    /// Location of the persisted chat history.
    pub fn history_path(&self) -> PathBuf {
        self.general.resolved_data_dir().join(&self.chat.history_file)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Read a secret from the environment variable named by `var`.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(NewsRagError::Config(format!(
            "environment variable {} is not set",
            var
        ))),
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for the index snapshot and chat history.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl GeneralConfig {
    /// `data_dir` with `~` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.newsrag".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// What the indexer does with a document whose embedding or expansion
/// collaborator call failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the document before it is assigned an article id.
    Skip,
    /// Abort the whole build; nothing is persisted.
    #[default]
    Abort,
}

/// What the indexer does when the expansion collaborator returns fewer
/// usable lines than the stride requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortExpansionPolicy {
    /// Fill the missing slots with a deterministic fallback query.
    #[default]
    Pad,
    /// Treat the short block as a document failure (see [`FailurePolicy`]).
    Reject,
}

/// Snapshot layout and build policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot directory, relative to `general.data_dir` unless absolute.
    pub dir: String,
    pub article_meta_file: String,
    pub article_index_file: String,
    pub expansion_index_file: String,
    pub expansion_meta_file: String,
    /// Written last; a snapshot without it is incomplete.
    pub manifest_file: String,
    pub failure_policy: FailurePolicy,
    pub short_expansion: ShortExpansionPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: "index".to_string(),
            article_meta_file: "news_api_metadata.json".to_string(),
            article_index_file: "news_api_index.vec".to_string(),
            expansion_index_file: "news_api_query_index.vec".to_string(),
            expansion_meta_file: "news_api_queries.json".to_string(),
            manifest_file: "news_api_manifest.json".to_string(),
            failure_policy: FailurePolicy::default(),
            short_expansion: ShortExpansionPolicy::default(),
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: String,
    /// Model name, recorded for diagnostics.
    pub model_name: String,
    /// Expected embedding dimension.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: "~/.newsrag/models/all-MiniLM-L6-v2".to_string(),
            model_name: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Query expansion (search query synthesis) collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub model: String,
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.3,
            max_tokens: 60,
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful news assistant. Answer the user's \
question using only the news context provided. If the context does not contain the answer, \
say that you could not find it in the recent news. Keep answers concise and factual.";

/// Answer synthesis collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Number of retrieved articles placed in the prompt.
    pub context_docs: usize,
    /// Number of prior turns placed in the prompt.
    pub history_turns: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            base_url: "https://router.huggingface.co/v1".to_string(),
            api_key_env: "HUGGINGFACE_TOKEN".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 200,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_docs: 3,
            history_turns: 5,
        }
    }
}

/// Retry and timeout policy for text generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            timeout_secs: 60,
        }
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Articles returned per query.
    pub top_k: usize,
    /// Raw expansion-index hits examined before deduplication.
    pub search_breadth: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            search_breadth: 10,
        }
    }
}

/// NewsAPI corpus acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub query_terms: Vec<String>,
    pub max_pages: u32,
    pub page_size: u32,
    pub lookback_days: i64,
    pub language: String,
    pub page_delay_ms: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key_env: "NEWS_API_KEY".to_string(),
            base_url: "https://newsapi.org/v2/everything".to_string(),
            query_terms: [
                "technology",
                "science",
                "world",
                "business",
                "health",
                "environment",
                "AI",
                "machine learning",
                "startup",
                "economy",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_pages: 100,
            page_size: 100,
            lookback_days: 30,
            language: "en".to_string(),
            page_delay_ms: 200,
        }
    }
}

/// Conversational session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// History file, relative to `general.data_dir` unless absolute.
    pub history_file: String,
    /// Upper bound on persisted turns; older turns are dropped.
    pub max_history_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_file: "chat_history/chat_history.json".to_string(),
            max_history_turns: 50,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = NewsRagConfig::default();
        assert_eq!(config.general.data_dir, "~/.newsrag");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.search_breadth, 10);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.expansion.model, "gpt-4o-mini");
        assert_eq!(config.expansion.max_tokens, 60);
        assert_eq!(config.answer.context_docs, 3);
        assert_eq!(config.answer.history_turns, 5);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.news.query_terms.len(), 10);
        assert_eq!(config.index.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.index.short_expansion, ShortExpansionPolicy::Pad);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[index]
failure_policy = "skip"
short_expansion = "reject"

[retrieval]
top_k = 3
search_breadth = 12

[retry]
max_attempts = 2
"#;
        let file = create_temp_config(content);
        let config = NewsRagConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.index.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.index.short_expansion, ShortExpansionPolicy::Reject);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.search_breadth, 12);
        assert_eq!(config.retry.max_attempts, 2);
        // Untouched fields keep their defaults.
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.index.dir, "index");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = NewsRagConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.data_dir, "~/.newsrag");
        assert_eq!(config.answer.max_tokens, 200);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = NewsRagConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.newsrag");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = NewsRagConfig::load(file.path());
        assert!(matches!(result, Err(NewsRagError::Config(_))));
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let file = create_temp_config("[index]\nfailure_policy = \"retry_forever\"\n");
        assert!(NewsRagConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = NewsRagConfig::default();
        config.retrieval.top_k = 7;
        config.index.failure_policy = FailurePolicy::Skip;
        config.save(&path).unwrap();

        let reloaded = NewsRagConfig::load(&path).unwrap();
        assert_eq!(reloaded.retrieval.top_k, 7);
        assert_eq!(reloaded.index.failure_policy, FailurePolicy::Skip);
        assert_eq!(reloaded.answer.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_index_and_history_paths() {
        let mut config = NewsRagConfig::default();
        config.general.data_dir = "/srv/newsrag".to_string();
        assert_eq!(config.index_dir(), PathBuf::from("/srv/newsrag/index"));
        assert_eq!(
            config.history_path(),
            PathBuf::from("/srv/newsrag/chat_history/chat_history.json")
        );
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
    }

    #[test]
    fn test_expand_home_resolves_tilde() {
        let expanded = expand_home("~/.newsrag");
        assert!(expanded.ends_with(".newsrag"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_api_key_from_env_missing() {
        let result = api_key_from_env("NEWSRAG_TEST_SURELY_UNSET_VARIABLE");
        assert!(matches!(result, Err(NewsRagError::Config(_))));
    }
}
