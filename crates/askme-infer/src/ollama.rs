//! Ollama embeddings over HTTP (`POST /api/embeddings`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedder::EmbedderBackend;
use askme_core::{Error, OllamaConfig, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self::with_client(client, &config.base_url(), &config.embed_model))
    }

    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbedderBackend for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("API error {}: {}", status, text)));
        }

        let data: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Malformed response: {}", e)))?;
        if data.embedding.is_empty() {
            return Err(Error::Embedding("model returned an empty embedding".into()));
        }
        debug!("Embedded {} chars into {} dims", text.len(), data.embedding.len());
        Ok(data.embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
