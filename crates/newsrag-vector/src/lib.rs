//! NewsRAG vector crate - embedding services and the flat vector index.
//!
//! Provides the embedding service trait with ONNX, lexical, and mock
//! implementations, and an append-only exact-search index with on-disk
//! persistence. Both are opaque capabilities to the retrieval layer.

pub mod embedding;
pub mod index;

pub use embedding::{
    BagOfWordsEmbedding, DynEmbeddingService, EmbeddingService, MockEmbedding,
    OnnxEmbeddingService,
};
pub use index::{IndexHit, VectorIndex};
