//! HTTP route handlers.

pub mod ask;
pub mod datasets;
pub mod health;
pub mod search;
pub mod ui;

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::{BoxError, Router};
use tower::timeout::error::Elapsed;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use askme_core::Error;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let timeout = state.config.request_timeout;

    Router::new()
        .merge(ui::routes())
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(datasets::routes())
        .merge(ask::routes())
        .merge(search::routes())
        .merge(health::routes())
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError(Error::Timeout("request exceeded the configured timeout".into()))
    } else {
        ApiError(Error::Io(std::io::Error::other(err.to_string())))
    }
}
