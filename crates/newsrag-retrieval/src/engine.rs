//! Query-time retrieval over the expansion index.
//!
//! A query is embedded, matched against the expansion-query vectors, and
//! every hit is mapped back to its owning article by `row / N`. Articles are
//! deduplicated in hit order, so each article ranks by its closest expansion
//! query.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use newsrag_core::config::RetrievalConfig;
use newsrag_core::error::{NewsRagError, Result};
use newsrag_core::types::{article_for_row, RankedArticle, RetrievalHit};
use newsrag_vector::DynEmbeddingService;

use crate::snapshot::IndexSnapshot;

/// How many articles to return and how many raw hits to examine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub search_breadth: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            search_breadth: 10,
        }
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            search_breadth: config.search_breadth,
        }
    }
}

/// Serves queries against the currently published snapshot.
pub struct RetrievalEngine {
    current: RwLock<Arc<IndexSnapshot>>,
    embedder: Arc<dyn DynEmbeddingService>,
    params: RetrievalParams,
}

impl RetrievalEngine {
    /// Create an engine serving `snapshot`. The embedder must be the one the
    /// snapshot was built with.
    pub fn new(snapshot: IndexSnapshot, embedder: Arc<dyn DynEmbeddingService>) -> Result<Self> {
        snapshot.validate()?;
        snapshot.check_embedder(embedder.as_ref())?;
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            embedder,
            params: RetrievalParams::default(),
        })
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    /// Replace the served snapshot. Queries already running keep the
    /// snapshot they started with.
    pub fn publish(&self, snapshot: IndexSnapshot) -> Result<()> {
        snapshot.validate()?;
        snapshot.check_embedder(self.embedder.as_ref())?;
        let articles = snapshot.article_count();
        let next = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(articles, "Published index snapshot");
        Ok(())
    }

    /// The snapshot currently being served.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Texts of the top articles for `query`, best first.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        search_breadth: usize,
    ) -> Result<Vec<String>> {
        Ok(self
            .retrieve_ranked(query, top_k, search_breadth)
            .await?
            .into_iter()
            .map(|ranked| ranked.text)
            .collect())
    }

    /// [`RetrievalEngine::retrieve`] with the engine's configured parameters.
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<String>> {
        self.retrieve(query, self.params.top_k, self.params.search_breadth)
            .await
    }

    /// Top articles for `query` with their best expansion-query distance.
    ///
    /// Blank queries, an empty index, and `top_k == 0` yield an empty list.
    /// Fewer unique articles than `top_k` is not an error.
    pub async fn retrieve_ranked(
        &self,
        query: &str,
        top_k: usize,
        search_breadth: usize,
    ) -> Result<Vec<RankedArticle>> {
        let query = query.trim();
        let snapshot = self.snapshot();
        if query.is_empty() || top_k == 0 || snapshot.expansion_index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_boxed(query).await?;
        let hits = snapshot.expansion_index.search(&vector, search_breadth)?;
        let hits: Vec<RetrievalHit> = hits
            .into_iter()
            .map(|hit| RetrievalHit {
                article_id: article_for_row(hit.row),
                distance: hit.distance,
            })
            .collect();

        let ranked = dedup_hits(&hits, top_k)
            .into_iter()
            .map(|hit| {
                let article = snapshot.article(hit.article_id).ok_or_else(|| {
                    NewsRagError::MetadataMismatch(format!(
                        "hit maps to article {} but only {} articles are stored",
                        hit.article_id,
                        snapshot.article_count()
                    ))
                })?;
                Ok(RankedArticle {
                    article_id: hit.article_id,
                    distance: hit.distance,
                    text: article.text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            raw_hits = hits.len(),
            returned = ranked.len(),
            "Retrieved articles"
        );
        Ok(ranked)
    }
}

/// Keep the first (closest) hit for each article, in hit order, up to `top_k`.
pub fn dedup_hits(hits: &[RetrievalHit], top_k: usize) -> Vec<RetrievalHit> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.article_id))
        .take(top_k)
        .copied()
        .collect()
}
