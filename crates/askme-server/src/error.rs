//! Mapping from pipeline errors to HTTP responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use askme_core::Error;

/// A handler error. The full error is logged; the client gets a redacted
/// message.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

/// Body-limit failures keep their 413; every other extractor failure is a
/// bad request.
fn rejected(status: StatusCode, what: &str, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(Error::PayloadTooLarge(detail))
    } else {
        ApiError(Error::InvalidRequest(format!("{}: {}", what, detail)))
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        rejected(e.status(), "malformed multipart body", e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        rejected(e.status(), "malformed multipart body", e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        rejected(e.status(), "invalid JSON body", e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        rejected(e.status(), "invalid query string", e.body_text())
    }
}

impl ApiError {
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "upload exceeds the size limit".to_string(),
            ),
            Error::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string()),
            Error::UnsupportedMediaType(mime) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("unsupported media type: {}", mime),
            ),
            Error::Parse(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "could not parse document".to_string(),
            ),
            Error::Embedding(_) | Error::Generation(_) | Error::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "language model service unavailable".to_string(),
            ),
            Error::Storage(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal storage error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::warn!("{}", self.0);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
