//! Route handler functions for all API endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Reply for a blank chat message.
pub const EMPTY_MESSAGE_REPLY: &str = "Please type a question about news.";

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub articles: usize,
    pub expansion_rows: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/chat - answer a question about the news.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.unwrap_or_default();
    let message = message.trim();
    if message.is_empty() {
        return Ok(Json(ChatResponse {
            answer: EMPTY_MESSAGE_REPLY.to_string(),
        }));
    }

    let reply = state.session.ask(message).await?;
    Ok(Json(ChatResponse {
        answer: reply.answer,
    }))
}

/// POST /api/clear - forget the conversation.
pub async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    state.session.clear().await?;
    Ok(Json(ClearResponse { ok: true }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.session.engine().snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        articles: snapshot.article_count(),
        expansion_rows: snapshot.expansion_rows(),
    })
}
