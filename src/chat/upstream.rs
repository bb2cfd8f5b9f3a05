// src/chat/upstream.rs
// Client for the local inference server (Ollama-compatible wire protocol)

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{LumenError, LumenResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// One parsed frame of the newline-delimited JSON chat stream.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Incremental token chunk
    Token(String),
    /// Upstream signalled completion
    Done,
}

pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    /// `GET /api/tags`
    pub async fn list_models(&self) -> LumenResult<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| LumenError::Upstream(format!("cannot reach inference server: {e}")))?;

        if !response.status().is_success() {
            return Err(LumenError::Upstream(format!(
                "inference server returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct Tags {
            #[serde(default)]
            models: Vec<ModelInfo>,
        }

        let tags: Tags = response
            .json()
            .await
            .map_err(|e| LumenError::Upstream(format!("malformed model list: {e}")))?;
        Ok(tags.models)
    }

    /// `POST /api/chat` with `stream: true`. Yields one event per parsed
    /// NDJSON line. Dropping the returned stream cancels the request at
    /// the next chunk boundary.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatTurn],
    ) -> LumenResult<BoxStream<'static, LumenResult<UpstreamEvent>>> {
        let body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LumenError::Upstream(format!("cannot reach inference server: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(LumenError::Upstream(format!(
                "inference server returned {status}: {detail}"
            )));
        }

        debug!("Upstream chat stream opened for model {model}");

        let byte_stream = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            futures_util::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk
                    .map_err(|e| LumenError::Upstream(format!("stream read failed: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if let Some(event) = parse_line(line)? {
                        let done = matches!(event, UpstreamEvent::Done);
                        yield event;
                        if done {
                            return;
                        }
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Parse one NDJSON line. Lines may carry `message.content` and/or `done`.
fn parse_line(line: &str) -> LumenResult<Option<UpstreamEvent>> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| LumenError::Upstream(format!("malformed stream line: {e}")))?;

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(LumenError::Upstream(error.to_string()));
    }

    if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
        return Ok(Some(UpstreamEvent::Done));
    }

    let content = value
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(UpstreamEvent::Token(content.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lines_parse() {
        let event = parse_line(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(event, UpstreamEvent::Token(t) if t == "Hel"));
    }

    #[test]
    fn done_lines_parse() {
        let event = parse_line(r#"{"done":true}"#).unwrap().unwrap();
        assert!(matches!(event, UpstreamEvent::Done));
    }

    #[test]
    fn error_lines_surface_as_upstream_errors() {
        assert!(parse_line(r#"{"error":"model not found"}"#).is_err());
    }

    #[test]
    fn empty_content_is_skipped() {
        assert!(parse_line(r#"{"message":{"content":""},"done":false}"#).unwrap().is_none());
    }
}
