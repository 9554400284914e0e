//! Question answering route.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use askme_chat::AskQuery;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ask", get(ask))
}

/// GET /api/ask?q= — answer a question from the uploaded documents.
async fn ask(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AskQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(query) = query?;
    info!("Question received ({} chars)", query.q.chars().count());
    let answer = state.rag.ask(&query.q).await?;
    Ok(Json(json!({ "message": answer.message })))
}
