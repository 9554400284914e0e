//! Health check: store reachability and chunk count.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let chunks = state.store.count().await?;
    Ok(Json(json!({
        "status": "ok",
        "backend": state.store.backend_name(),
        "chunks": chunks,
    })))
}
