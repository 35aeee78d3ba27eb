//! End-to-end tests for the retrieval core: build a snapshot from a corpus,
//! persist it, reload it, and query it.

use std::sync::Arc;

use newsrag_core::corpus::StaticCorpus;
use newsrag_core::types::{article_for_row, RawDocument, EXPANSION_STRIDE};
use newsrag_llm::{MockGenerator, TextGenerator};
use newsrag_retrieval::{
    CorpusIndexer, IndexSnapshot, IndexerOptions, Provenance, QueryExpansionGenerator,
    RetrievalEngine, SnapshotPaths, SnapshotStore,
};
use newsrag_vector::{BagOfWordsEmbedding, DynEmbeddingService};

// =============================================================================
// Helpers
// =============================================================================

/// Expansion model stand-in that writes topical queries for each article.
fn topical_generator() -> MockGenerator {
    MockGenerator::from_fn(|request| {
        let prompt = request.last_user_content().unwrap_or_default();
        let queries = if prompt.contains("Stocks rise today") {
            "stock market news today\nstocks rise on wall street\nstock market rally"
        } else if prompt.contains("New AI chip released") {
            "new ai chip launch\nai hardware release\nsemiconductor chip news"
        } else {
            "general news update\nlatest headlines today\ntop stories now"
        };
        Ok(queries.to_string())
    })
}

fn embedder() -> Arc<dyn DynEmbeddingService> {
    Arc::new(BagOfWordsEmbedding::default())
}

fn indexer(generator: Arc<dyn TextGenerator>) -> CorpusIndexer {
    CorpusIndexer::new(
        embedder(),
        QueryExpansionGenerator::new(generator),
        IndexerOptions::default(),
    )
}

fn two_article_corpus() -> StaticCorpus {
    StaticCorpus::new(vec![
        RawDocument::new("Stocks rise today").with_attribute("title", "Markets"),
        RawDocument::new("New AI chip released").with_attribute("title", "Tech"),
    ])
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_two_article_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
    let (snapshot, provenance) = indexer(Arc::new(topical_generator()))
        .build_or_load(&store, &two_article_corpus())
        .await
        .unwrap();

    assert!(matches!(provenance, Provenance::Built(_)));
    assert_eq!(snapshot.article_count(), 2);
    assert_eq!(snapshot.expansion_rows(), 2 * EXPANSION_STRIDE);

    let engine = RetrievalEngine::new(snapshot, embedder()).unwrap();
    let ranked = engine
        .retrieve_ranked("stock market news", 5, 10)
        .await
        .unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].article_id, 0);
    assert_eq!(ranked[0].text, "Stocks rise today");
    assert_eq!(ranked[1].article_id, 1);
    assert!(ranked[0].distance < ranked[1].distance);

    let ai = engine.retrieve("ai chip", 1, 10).await.unwrap();
    assert_eq!(ai, vec!["New AI chip released"]);
}

#[tokio::test]
async fn test_reload_serves_identical_results() {
    let tmp = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));

    let generator = Arc::new(topical_generator());
    let shared: Arc<dyn TextGenerator> = generator.clone();
    let (built, _) = indexer(shared)
        .build_or_load(&store, &two_article_corpus())
        .await
        .unwrap();
    let calls_after_build = generator.calls();

    // A fresh process: new indexer, same store, a corpus that must not be read.
    let (loaded, provenance) = indexer(Arc::new(MockGenerator::failing("offline")))
        .build_or_load(&store, &StaticCorpus::default())
        .await
        .unwrap();
    assert_eq!(provenance, Provenance::Loaded);
    assert_eq!(generator.calls(), calls_after_build);
    assert_eq!(loaded, built);

    let a = RetrievalEngine::new(built, embedder()).unwrap();
    let b = RetrievalEngine::new(loaded, embedder()).unwrap();
    for query in ["stock market news", "semiconductor", "headlines"] {
        assert_eq!(
            a.retrieve_ranked(query, 5, 10).await.unwrap(),
            b.retrieve_ranked(query, 5, 10).await.unwrap()
        );
    }
}

#[tokio::test]
async fn test_stride_holds_across_larger_corpus() {
    let corpus = StaticCorpus::from_texts((0..25).map(|i| format!("Headline number {} today", i)));
    let tmp = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
    let (snapshot, _) = indexer(Arc::new(topical_generator()))
        .build_or_load(&store, &corpus)
        .await
        .unwrap();

    assert_eq!(snapshot.expansion_rows(), 25 * EXPANSION_STRIDE);
    for (id, record) in snapshot.expansions.iter().enumerate() {
        assert_eq!(record.article.id, id);
        assert_eq!(record.queries.len(), EXPANSION_STRIDE);
    }
    for row in 0..snapshot.expansion_rows() {
        assert!(article_for_row(row) < snapshot.article_count());
    }
}

#[tokio::test]
async fn test_empty_corpus_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(SnapshotPaths::in_dir(tmp.path()));
    let (snapshot, _) = indexer(Arc::new(topical_generator()))
        .build_or_load(&store, &StaticCorpus::default())
        .await
        .unwrap();
    assert!(store.exists());
    assert_eq!(
        snapshot,
        IndexSnapshot::empty(snapshot.embedder.clone(), snapshot.dim())
    );

    let engine = RetrievalEngine::new(store.load().unwrap(), embedder()).unwrap();
    assert!(engine.retrieve("anything", 5, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_rebuilt_snapshot() {
    let generator: Arc<dyn TextGenerator> = Arc::new(topical_generator());
    let indexer = indexer(generator);

    let first = indexer
        .build(vec![RawDocument::new("New AI chip released")])
        .await
        .unwrap();
    let engine = RetrievalEngine::new(first.snapshot, embedder()).unwrap();
    assert_eq!(
        engine.retrieve("stock market news", 5, 10).await.unwrap(),
        vec!["New AI chip released"]
    );

    let second = indexer
        .build(vec![
            RawDocument::new("Stocks rise today"),
            RawDocument::new("New AI chip released"),
        ])
        .await
        .unwrap();
    engine.publish(second.snapshot).unwrap();
    let top = engine.retrieve("stock market news", 1, 10).await.unwrap();
    assert_eq!(top, vec!["Stocks rise today"]);
}
