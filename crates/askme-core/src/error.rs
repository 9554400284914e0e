//! Error types for Ask Me.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the model server (embedding or generation).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::Generation(_) | Self::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
