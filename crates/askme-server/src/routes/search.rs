//! Raw similarity search over the vector table.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use askme_core::Error;
use askme_store::MetadataFilter;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub k: Option<usize>,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(search))
}

/// POST /api/search — `{ query, k?, filter? }` to scored chunks.
async fn search(
    State(state): State<Arc<AppState>>,
    req: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = req?;
    if req.query.trim().is_empty() {
        return Err(Error::InvalidRequest("query must not be empty".into()).into());
    }
    let k = req.k.unwrap_or(state.rag.top_k());
    let results = state
        .rag
        .retrieve(&req.query, k, req.filter.as_ref())
        .await?;
    Ok(Json(json!({ "results": results })))
}
