//! Conversational interface for NewsRAG.
//!
//! Wraps the retrieval engine in a question/answer session: retrieved
//! articles and recent turns are handed to the answer model, and each turn
//! is appended to a bounded, file-backed history.

pub mod answer;
pub mod error;
pub mod history;
pub mod session;

pub use answer::{AnswerGenerator, NO_CONTEXT};
pub use error::ChatError;
pub use history::HistoryStore;
pub use session::{ChatReply, ChatSession};
