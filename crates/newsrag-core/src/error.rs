use thiserror::Error;

/// Top-level error type for the NewsRAG system.
///
/// Subsystem crates define their own error types where they need a finer
/// taxonomy and implement `From<SubsystemError> for NewsRagError` so that the
/// `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NewsRagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Stride violation: {rows} expansion rows for {articles} articles (stride {stride})")]
    StrideViolation {
        articles: usize,
        rows: usize,
        stride: usize,
    },

    #[error("Article id gap: position {position} holds article id {found}")]
    IdGap { position: usize, found: usize },

    #[error("Metadata mismatch: {0}")]
    MetadataMismatch(String),

    #[error("Malformed expansion: expected {expected} queries, got {got}")]
    MalformedExpansion { expected: usize, got: usize },

    #[error("Embedder mismatch: snapshot built with {built_with}, queried with {serving}")]
    EmbedderMismatch { built_with: String, serving: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("History error: {0}")]
    History(String),
}

impl NewsRagError {
    /// True for errors that mean the index topology can no longer be trusted.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            NewsRagError::StrideViolation { .. }
                | NewsRagError::IdGap { .. }
                | NewsRagError::MetadataMismatch(_)
                | NewsRagError::EmbedderMismatch { .. }
        )
    }

    /// True for failures of an external collaborator (embedding, generation,
    /// news source). These are recoverable at the call boundary.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            NewsRagError::Embedding(_) | NewsRagError::Generation(_) | NewsRagError::Corpus(_)
        )
    }
}

impl From<toml::de::Error> for NewsRagError {
    fn from(err: toml::de::Error) -> Self {
        NewsRagError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NewsRagError {
    fn from(err: toml::ser::Error) -> Self {
        NewsRagError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NewsRagError {
    fn from(err: serde_json::Error) -> Self {
        NewsRagError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for NewsRAG operations.
pub type Result<T> = std::result::Result<T, NewsRagError>;
