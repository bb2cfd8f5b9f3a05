// src/config/embedding.rs
// Embedding backend configuration

use serde::{Deserialize, Serialize};

use super::{env_parsed, env_string};

/// Embedding backend selection and tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Explicit backend override: "accelerated", "http", or "hash".
    /// Empty means auto-detect in preference order.
    pub backend_override: Option<String>,
    /// Loopback embedding service (Ollama-compatible)
    pub http_base_url: String,
    pub http_model: String,
    /// Probe timeout for backend detection, in milliseconds
    pub probe_timeout_ms: u64,
    /// Per-call timeout for the HTTP backend, in seconds
    pub request_timeout_secs: u64,
    /// Dimensionality of the hash fallback
    pub hash_dimensions: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let backend_override = std::env::var("EMBEDDING_BACKEND")
            .ok()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());

        Self {
            backend_override,
            http_base_url: env_string("LUMEN_EMBED_URL", "http://127.0.0.1:11434"),
            http_model: env_string("LUMEN_EMBED_MODEL", "nomic-embed-text"),
            probe_timeout_ms: env_parsed("LUMEN_EMBED_PROBE_TIMEOUT_MS", 1500),
            request_timeout_secs: env_parsed("LUMEN_EMBED_TIMEOUT_SECS", 30),
            hash_dimensions: env_parsed("LUMEN_EMBED_HASH_DIMENSIONS", 384),
        }
    }
}
