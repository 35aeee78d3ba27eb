//! NewsRAG core crate - error taxonomy, configuration, data model, and the
//! corpus source seam shared by every other crate.

pub mod config;
pub mod corpus;
pub mod error;
pub mod types;

pub use config::NewsRagConfig;
pub use corpus::{CorpusSource, JsonCorpus, StaticCorpus};
pub use error::{NewsRagError, Result};
pub use types::*;
