//! Embedding engine trait.

use async_trait::async_trait;

use askme_core::Result;

/// Turns text into a fixed-width vector.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, in order.
    ///
    /// Calls [`embed`](EmbedderBackend::embed) one text at a time and stops
    /// at the first failure.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
