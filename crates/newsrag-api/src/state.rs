//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use newsrag_chat::ChatSession;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// The chat session; owns the retrieval engine and history.
    pub session: Arc<ChatSession>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session: Arc<ChatSession>) -> Self {
        Self {
            session,
            start_time: Instant::now(),
        }
    }
}
