//! NewsRAG retrieval crate - the query-expansion-augmented retrieval core.
//!
//! Articles are indexed twice: once by their own embedding and once by the
//! embeddings of N synthesized search queries, laid out so that expansion
//! row `r` belongs to article `r / N`. Retrieval searches the expansion
//! index, maps hits back to articles, and deduplicates in distance order.

pub mod engine;
pub mod expansion;
pub mod indexer;
pub mod snapshot;

pub use engine::{dedup_hits, RetrievalEngine, RetrievalParams};
pub use expansion::{QueryExpansionGenerator, FALLBACK_QUERY_WORDS};
pub use indexer::{BuildOutcome, BuildReport, CorpusIndexer, IndexerOptions, Provenance};
pub use snapshot::{IndexSnapshot, SnapshotPaths, SnapshotStore};
