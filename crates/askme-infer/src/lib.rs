//! Ask Me Infer — embedding generation.
//!
//! Provides the `EmbedderBackend` trait. `OllamaEmbedder` talks to a local
//! Ollama server; tests substitute their own implementations.

pub mod embedder;
pub mod ollama;

pub use embedder::EmbedderBackend;
pub use ollama::OllamaEmbedder;

use std::sync::Arc;

use askme_core::{OllamaConfig, Result};

/// Create the embedder described by configuration.
pub fn create_embedder(config: &OllamaConfig) -> Result<Arc<dyn EmbedderBackend>> {
    let embedder = OllamaEmbedder::new(config)?;
    tracing::info!(
        "Using Ollama embedder (model={}, url={})",
        config.embed_model,
        config.base_url()
    );
    Ok(Arc::new(embedder))
}
