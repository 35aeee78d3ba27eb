//! Corpus indexing: raw documents in, a validated [`IndexSnapshot`] out.
//!
//! Every collaborator call for a document (expansion and all embeddings)
//! completes before the document is given an id. A document that fails at
//! that stage is either skipped without touching either index or aborts the
//! build, so the expansion index always holds exactly N rows per article.

use std::sync::Arc;

use tracing::{debug, info, warn};

use newsrag_core::config::{FailurePolicy, IndexConfig, ShortExpansionPolicy};
use newsrag_core::corpus::CorpusSource;
use newsrag_core::error::{NewsRagError, Result};
use newsrag_core::types::{Article, ExpansionRecord, RawDocument, EXPANSION_STRIDE};
use newsrag_vector::DynEmbeddingService;

use crate::expansion::{pad_queries, QueryExpansionGenerator};
use crate::snapshot::{IndexSnapshot, SnapshotStore};

/// Build-time policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerOptions {
    pub failure_policy: FailurePolicy,
    pub short_expansion: ShortExpansionPolicy,
}

impl From<&IndexConfig> for IndexerOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            failure_policy: config.failure_policy,
            short_expansion: config.short_expansion,
        }
    }
}

/// What happened to the corpus during a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub dropped_empty: usize,
    pub skipped: usize,
    pub padded: usize,
}

/// A freshly built snapshot plus its build report.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub snapshot: IndexSnapshot,
    pub report: BuildReport,
}

/// Where a snapshot returned by [`CorpusIndexer::build_or_load`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Loaded,
    Built(BuildReport),
}

/// Everything computed for one document before it is accepted.
struct PreparedDocument {
    queries: Vec<String>,
    padded: bool,
    article_vector: Vec<f32>,
    query_vectors: Vec<Vec<f32>>,
}

/// Builds index snapshots from a corpus.
pub struct CorpusIndexer {
    embedder: Arc<dyn DynEmbeddingService>,
    expansion: QueryExpansionGenerator,
    options: IndexerOptions,
}

impl CorpusIndexer {
    pub fn new(
        embedder: Arc<dyn DynEmbeddingService>,
        expansion: QueryExpansionGenerator,
        options: IndexerOptions,
    ) -> Self {
        Self {
            embedder,
            expansion,
            options,
        }
    }

    pub fn options(&self) -> IndexerOptions {
        self.options
    }

    /// Index `documents` in order.
    pub async fn build(&self, documents: Vec<RawDocument>) -> Result<BuildOutcome> {
        let dim = self.embedder.dimensions();
        let mut snapshot = IndexSnapshot::empty(self.embedder.model_id(), dim);
        let mut report = BuildReport::default();
        let total = documents.len();

        info!(documents = total, stride = EXPANSION_STRIDE, "Building index snapshot");

        for (position, document) in documents.into_iter().enumerate() {
            let Some(text) = document.normalized_text() else {
                report.dropped_empty += 1;
                debug!(position, "Dropping empty document");
                continue;
            };

            let prepared = match self.prepare(text, dim).await {
                Ok(prepared) => prepared,
                Err(err) => match self.options.failure_policy {
                    FailurePolicy::Skip => {
                        warn!(position, error = %err, "Skipping document");
                        report.skipped += 1;
                        continue;
                    }
                    FailurePolicy::Abort => {
                        return Err(err);
                    }
                },
            };

            let article = Article {
                id: snapshot.articles.len(),
                text: text.to_string(),
                attributes: document.attributes.clone(),
            };

            snapshot.article_index.add(&[prepared.article_vector])?;
            snapshot.expansion_index.add(&prepared.query_vectors)?;
            snapshot.expansions.push(ExpansionRecord {
                article: article.clone(),
                queries: prepared.queries,
            });
            snapshot.articles.push(article);

            report.indexed += 1;
            if prepared.padded {
                report.padded += 1;
            }
            if report.indexed % 50 == 0 {
                info!(indexed = report.indexed, total, "Indexing progress");
            }
        }

        snapshot.validate()?;

        info!(
            indexed = report.indexed,
            dropped_empty = report.dropped_empty,
            skipped = report.skipped,
            padded = report.padded,
            expansion_rows = snapshot.expansion_rows(),
            "Index snapshot built"
        );
        Ok(BuildOutcome { snapshot, report })
    }

    /// Load the persisted snapshot if it is complete; otherwise fetch the
    /// corpus, build, persist, and return the new snapshot.
    ///
    /// A persisted snapshot built by a different embedder is an error, not
    /// a reason to rebuild; use [`CorpusIndexer::rebuild`] for that.
    pub async fn build_or_load(
        &self,
        store: &SnapshotStore,
        source: &dyn CorpusSource,
    ) -> Result<(IndexSnapshot, Provenance)> {
        if store.exists() {
            let snapshot = store.load()?;
            snapshot.check_embedder(self.embedder.as_ref())?;
            return Ok((snapshot, Provenance::Loaded));
        }

        info!("No persisted snapshot found, building from corpus");
        let outcome = self.rebuild(store, source).await?;
        Ok((outcome.snapshot, Provenance::Built(outcome.report)))
    }

    /// Build from `source` and persist over whatever `store` holds.
    ///
    /// The previous snapshot is only replaced once the new one has been
    /// built and validated; a failed fetch or build leaves it untouched.
    pub async fn rebuild(
        &self,
        store: &SnapshotStore,
        source: &dyn CorpusSource,
    ) -> Result<BuildOutcome> {
        let documents = source.documents().await?;
        let outcome = self.build(documents).await?;
        store.persist(&outcome.snapshot)?;
        Ok(outcome)
    }

    async fn prepare(&self, text: &str, dim: usize) -> Result<PreparedDocument> {
        let (queries, padded) = match self.options.short_expansion {
            ShortExpansionPolicy::Reject => (self.expansion.expand(text).await?, false),
            ShortExpansionPolicy::Pad => {
                let queries = self.expansion.expand_lenient(text).await?;
                if queries.len() < EXPANSION_STRIDE {
                    debug!(got = queries.len(), "Padding short expansion");
                    (pad_queries(queries, text), true)
                } else {
                    (queries, false)
                }
            }
        };

        let article_vector = self.embedder.embed_boxed(text).await?;
        let query_vectors = self.embedder.embed_batch_boxed(&queries).await?;

        if query_vectors.len() != EXPANSION_STRIDE {
            return Err(NewsRagError::Embedding(format!(
                "expected {} query vectors, got {}",
                EXPANSION_STRIDE,
                query_vectors.len()
            )));
        }
        if let Some(bad) = std::iter::once(&article_vector)
            .chain(&query_vectors)
            .find(|v| v.len() != dim)
        {
            return Err(NewsRagError::Embedding(format!(
                "embedding has dimension {}, expected {}",
                bad.len(),
                dim
            )));
        }

        Ok(PreparedDocument {
            queries,
            padded,
            article_vector,
            query_vectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsrag_core::corpus::{JsonCorpus, StaticCorpus};
    use newsrag_core::types::article_for_row;
    use newsrag_llm::{LlmError, MockGenerator, TextGenerator};
    use newsrag_vector::{BagOfWordsEmbedding, MockEmbedding};

    use crate::snapshot::SnapshotPaths;

    fn indexer(generator: MockGenerator, options: IndexerOptions) -> CorpusIndexer {
        let generator: Arc<dyn TextGenerator> = Arc::new(generator);
        CorpusIndexer::new(
            Arc::new(MockEmbedding::new()),
            QueryExpansionGenerator::new(generator),
            options,
        )
    }

    fn three_queries() -> MockGenerator {
        MockGenerator::constant("first query here\nsecond query here\nthird query here")
    }

    fn docs(texts: &[&str]) -> Vec<RawDocument> {
        texts.iter().map(|t| RawDocument::new(*t)).collect()
    }

    #[tokio::test]
    async fn test_stride_invariant_holds() {
        let outcome = indexer(three_queries(), IndexerOptions::default())
            .build(docs(&["one", "two", "three", "four"]))
            .await
            .unwrap();
        let snapshot = outcome.snapshot;
        assert_eq!(snapshot.article_count(), 4);
        assert_eq!(snapshot.article_index.len(), 4);
        assert_eq!(snapshot.expansion_rows(), 4 * EXPANSION_STRIDE);
        for row in 0..snapshot.expansion_rows() {
            let owner = article_for_row(row);
            assert_eq!(snapshot.articles[owner].id, owner);
        }
        assert_eq!(outcome.report.indexed, 4);
    }

    #[tokio::test]
    async fn test_empty_corpus_builds_empty_snapshot() {
        let outcome = indexer(three_queries(), IndexerOptions::default())
            .build(Vec::new())
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.article_count(), 0);
        assert!(outcome.snapshot.article_index.is_empty());
        assert!(outcome.snapshot.expansion_index.is_empty());
        assert_eq!(outcome.snapshot.dim(), 384);
    }

    #[tokio::test]
    async fn test_blank_documents_dropped_without_ids() {
        let generator = three_queries();
        let outcome = indexer(generator, IndexerOptions::default())
            .build(docs(&["  ", "kept one", "\n\t", "kept two"]))
            .await
            .unwrap();
        assert_eq!(outcome.report.dropped_empty, 2);
        assert_eq!(outcome.snapshot.articles[0].text, "kept one");
        assert_eq!(outcome.snapshot.articles[1].id, 1);
        assert_eq!(outcome.snapshot.articles[1].text, "kept two");
    }

    #[tokio::test]
    async fn test_attributes_carried_onto_articles() {
        let documents = vec![RawDocument::new(" Stocks rise today ")
            .with_attribute("title", "Stocks rise")
            .with_attribute("url", "https://news.example/stocks")];
        let outcome = indexer(three_queries(), IndexerOptions::default())
            .build(documents)
            .await
            .unwrap();
        let article = &outcome.snapshot.articles[0];
        assert_eq!(article.text, "Stocks rise today");
        assert_eq!(article.attribute("url"), Some("https://news.example/stocks"));
        assert_eq!(outcome.snapshot.expansions[0].article, *article);
    }

    #[tokio::test]
    async fn test_skip_policy_keeps_ids_contiguous() {
        let generator = MockGenerator::with_responses(vec![
            Ok("a one\na two\na three".into()),
            Err(LlmError::Status {
                status: 400,
                body: "bad request".into(),
            }),
            Ok("c one\nc two\nc three".into()),
        ]);
        let options = IndexerOptions {
            failure_policy: FailurePolicy::Skip,
            ..IndexerOptions::default()
        };
        let outcome = indexer(generator, options)
            .build(docs(&["alpha", "beta", "gamma"]))
            .await
            .unwrap();
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.report.indexed, 2);
        let snapshot = outcome.snapshot;
        assert_eq!(snapshot.articles[1].id, 1);
        assert_eq!(snapshot.articles[1].text, "gamma");
        assert_eq!(snapshot.expansions[1].queries[0], "c one");
        assert_eq!(snapshot.expansion_rows(), 2 * EXPANSION_STRIDE);
        snapshot.validate().unwrap();
    }

    #[tokio::test]
    async fn test_abort_policy_propagates_failure() {
        let generator = MockGenerator::with_responses(vec![
            Ok("a one\na two\na three".into()),
            Err(LlmError::Transport("down".into())),
        ]);
        let err = indexer(generator, IndexerOptions::default())
            .build(docs(&["alpha", "beta", "gamma"]))
            .await
            .unwrap_err();
        assert!(matches!(err, NewsRagError::Generation(_)));
    }

    #[tokio::test]
    async fn test_short_expansion_padded() {
        let generator = MockGenerator::constant("only one query");
        let outcome = indexer(generator, IndexerOptions::default())
            .build(docs(&["Stocks rise today on strong earnings reports again"]))
            .await
            .unwrap();
        assert_eq!(outcome.report.padded, 1);
        assert_eq!(
            outcome.snapshot.expansions[0].queries,
            vec![
                "only one query",
                "Stocks rise today on strong earnings",
                "Stocks rise today on strong earnings"
            ]
        );
    }

    #[tokio::test]
    async fn test_short_expansion_rejected_then_skipped() {
        let generator = MockGenerator::with_responses(vec![
            Ok("just one".into()),
            Ok("b one\nb two\nb three".into()),
        ]);
        let options = IndexerOptions {
            failure_policy: FailurePolicy::Skip,
            short_expansion: ShortExpansionPolicy::Reject,
        };
        let outcome = indexer(generator, options)
            .build(docs(&["alpha", "beta"]))
            .await
            .unwrap();
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.snapshot.articles.len(), 1);
        assert_eq!(outcome.snapshot.articles[0].text, "beta");
    }

    #[tokio::test]
    async fn test_short_expansion_rejected_aborts() {
        let options = IndexerOptions {
            failure_policy: FailurePolicy::Abort,
            short_expansion: ShortExpansionPolicy::Reject,
        };
        let err = indexer(MockGenerator::constant("one\ntwo"), options)
            .build(docs(&["alpha"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NewsRagError::MalformedExpansion {
                expected: 3,
                got: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_build_or_load_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
        let corpus = StaticCorpus::from_texts(["Stocks rise today", "New AI chip released"]);

        let generator = Arc::new(three_queries());
        let shared: Arc<dyn TextGenerator> = generator.clone();
        let indexer = CorpusIndexer::new(
            Arc::new(MockEmbedding::new()),
            QueryExpansionGenerator::new(shared),
            IndexerOptions::default(),
        );

        let (first, provenance) = indexer.build_or_load(&store, &corpus).await.unwrap();
        assert!(matches!(provenance, Provenance::Built(report) if report.indexed == 2));
        assert_eq!(generator.calls(), 2);

        // Second call must not consult the corpus or the generator.
        let empty = StaticCorpus::default();
        let (second, provenance) = indexer.build_or_load(&store, &empty).await.unwrap();
        assert_eq!(provenance, Provenance::Loaded);
        assert_eq!(generator.calls(), 2);
        assert_eq!(second, first);
        assert_eq!(second.articles[0].text, "Stocks rise today");
        assert_eq!(second.expansion_rows(), 6);
    }

    #[tokio::test]
    async fn test_build_or_load_rejects_snapshot_from_other_embedder() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
        let corpus = StaticCorpus::from_texts(["Stocks rise today", "New AI chip released"]);
        indexer(three_queries(), IndexerOptions::default())
            .build_or_load(&store, &corpus)
            .await
            .unwrap();

        // Same dimension, different model.
        let generator: Arc<dyn TextGenerator> = Arc::new(three_queries());
        let other = CorpusIndexer::new(
            Arc::new(BagOfWordsEmbedding::new(384)),
            QueryExpansionGenerator::new(generator),
            IndexerOptions::default(),
        );
        let err = other.build_or_load(&store, &corpus).await.unwrap_err();
        assert!(matches!(err, NewsRagError::EmbedderMismatch { .. }));
        assert!(err.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_snapshot_records_embedder() {
        let outcome = indexer(three_queries(), IndexerOptions::default())
            .build(docs(&["Stocks rise today"]))
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.embedder, "mock-384");
    }

    #[tokio::test]
    async fn test_rebuild_replaces_persisted_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
        let indexer = indexer(three_queries(), IndexerOptions::default());
        indexer
            .build_or_load(&store, &StaticCorpus::from_texts(["Stocks rise today"]))
            .await
            .unwrap();

        let outcome = indexer
            .rebuild(
                &store,
                &StaticCorpus::from_texts(["New AI chip released", "Rates hold steady"]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.report.indexed, 2);
        assert_eq!(store.load().unwrap(), outcome.snapshot);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
        let (original, _) = indexer(three_queries(), IndexerOptions::default())
            .build_or_load(&store, &StaticCorpus::from_texts(["Stocks rise today"]))
            .await
            .unwrap();

        // Corpus unreadable.
        let missing = JsonCorpus::new(tmp.path().join("missing.json"));
        let err = indexer(three_queries(), IndexerOptions::default())
            .rebuild(&store, &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, NewsRagError::Io(_)));
        assert_eq!(store.load().unwrap(), original);

        // Expansion model down.
        let failing = indexer(MockGenerator::failing("offline"), IndexerOptions::default());
        assert!(failing
            .rebuild(&store, &StaticCorpus::from_texts(["New AI chip released"]))
            .await
            .is_err());
        assert_eq!(store.load().unwrap(), original);
    }
}
