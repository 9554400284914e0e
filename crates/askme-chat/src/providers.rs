//! Text generation backends.
//!
//! `OllamaLlm` posts to `/api/generate` with streaming disabled and returns
//! the whole `response` field.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use askme_core::{Error, OllamaConfig, Result};

/// A model that completes a prompt into text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaLlm {
    client: Client,
    url: String,
    model: String,
}

impl OllamaLlm {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self::with_client(client, &config.base_url(), &config.model))
    }

    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!("Generating with model {}", self.model);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("API error {}: {}", status, body)));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Malformed response: {}", e)))?;
        Ok(data.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};

    #[tokio::test]
    async fn test_generate_is_not_streamed() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], false);
                assert_eq!(body["model"], "tinydolphin");
                Json(serde_json::json!({
                    "model": "tinydolphin",
                    "response": format!("echo: {}", body["prompt"].as_str().unwrap()),
                    "done": true,
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let llm = OllamaLlm::with_client(Client::new(), &format!("http://{}/", addr), "tinydolphin");
        assert_eq!(llm.complete("hi").await.unwrap(), "echo: hi");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_error() {
        let llm = OllamaLlm::with_client(Client::new(), "http://127.0.0.1:9", "tinydolphin");
        assert!(matches!(llm.complete("hi").await, Err(Error::Generation(_))));
    }
}
