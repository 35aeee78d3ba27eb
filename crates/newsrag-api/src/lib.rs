//! NewsRAG API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat session over HTTP: `POST /api/chat`, `POST /api/clear`,
//! and `GET /health`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
