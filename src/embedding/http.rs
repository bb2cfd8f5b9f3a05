// src/embedding/http.rs
// Loopback embedding service client (Ollama-compatible)

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{BackendKind, EmbeddingBackend};

/// Client for a local embedding endpoint on loopback.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(base_url: String, model: String, request_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            model,
        }
    }

    /// Probe the service with a short timeout. Used once at selection time.
    pub async fn probe(base_url: &str, timeout_ms: u64) -> bool {
        let client = match Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };

        match client.get(format!("{base_url}/api/tags")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Embedding service probe failed: {e}");
                false
            }
        }
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding service error {status}: {error_text}"));
        }

        let raw: Value = response.json().await?;
        let embedding: Vec<f32> = raw
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("no embedding in response"))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if embedding.is_empty() {
            return Err(anyhow!("embedding service returned empty vector"));
        }

        debug!("Embedded {} chars into {} dims", text.len(), embedding.len());
        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embedding(text).await
    }
}
