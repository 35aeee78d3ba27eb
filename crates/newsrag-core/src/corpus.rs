//! Corpus sources feeding the indexer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::types::RawDocument;

/// Anything that can produce the raw documents of a corpus snapshot.
///
/// The indexer only consults a source when no persisted snapshot exists.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn documents(&self) -> Result<Vec<RawDocument>>;
}

/// A corpus stored on disk as a JSON array of [`RawDocument`]s.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CorpusSource for JsonCorpus {
    async fn documents(&self) -> Result<Vec<RawDocument>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let documents: Vec<RawDocument> = serde_json::from_str(&content)?;
        info!(path = %self.path.display(), documents = documents.len(), "Loaded local corpus");
        Ok(documents)
    }
}

/// An in-memory corpus, mostly useful for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    documents: Vec<RawDocument>,
}

impl StaticCorpus {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(RawDocument::new).collect())
    }
}

#[async_trait]
impl CorpusSource for StaticCorpus {
    async fn documents(&self) -> Result<Vec<RawDocument>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NewsRagError;

    #[tokio::test]
    async fn test_json_corpus_reads_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{"text": "Stocks rise today", "attributes": {"title": "Markets"}},
                {"text": "New AI chip released"}]"#,
        )
        .unwrap();

        let docs = JsonCorpus::new(&path).documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].attributes["title"], "Markets");
        assert_eq!(docs[1].text, "New AI chip released");
    }

    #[tokio::test]
    async fn test_json_corpus_missing_file() {
        let result = JsonCorpus::new("/nonexistent/corpus.json").documents().await;
        assert!(matches!(result, Err(NewsRagError::Io(_))));
    }

    #[tokio::test]
    async fn test_json_corpus_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(&path, "{not json").unwrap();
        let result = JsonCorpus::new(&path).documents().await;
        assert!(matches!(result, Err(NewsRagError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_static_corpus() {
        let corpus = StaticCorpus::from_texts(["a", "b"]);
        let docs = corpus.documents().await.unwrap();
        assert_eq!(docs, vec![RawDocument::new("a"), RawDocument::new("b")]);
    }
}
