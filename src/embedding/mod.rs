// src/embedding/mod.rs
// Embedding backend selector: one embed() contract over a preference-ordered
// list of backends

pub mod hash;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EmbeddingConfig;

pub use hash::hash_embed;

/// Which backend the selector resolved at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hardware-accelerated in-process library
    Accelerated,
    /// Local HTTP embedding service on loopback
    Http,
    /// Deterministic hash fallback, always available
    Hash,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Accelerated => "accelerated",
            BackendKind::Http => "http",
            BackendKind::Hash => "hash",
        }
    }
}

/// The seam every backend implements. One virtual dispatch per call.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic salted-hash backend. Never fails.
struct HashBackend {
    dims: usize,
}

#[async_trait]
impl EmbeddingBackend for HashBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hash
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text, self.dims))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub backend: BackendKind,
    pub dimensions: usize,
}

/// Unified embedder. Selection happens once in `init`; transient backend
/// failures degrade to the hash fallback for that call only, and the
/// selection itself is not changed.
pub struct Embedder {
    backend: Box<dyn EmbeddingBackend>,
    hash_dims: usize,
}

impl Embedder {
    /// Resolve the backend: explicit `EMBEDDING_BACKEND` override first,
    /// then accelerated -> http -> hash in preference order.
    pub async fn init(config: &EmbeddingConfig) -> Self {
        let kind = match config.backend_override.as_deref() {
            Some("accelerated") => BackendKind::Accelerated,
            Some("http") => BackendKind::Http,
            Some("hash") => BackendKind::Hash,
            Some(other) => {
                warn!("Unknown EMBEDDING_BACKEND '{other}', auto-detecting");
                Self::detect(config).await
            }
            None => Self::detect(config).await,
        };

        let backend: Box<dyn EmbeddingBackend> = match kind {
            BackendKind::Http => Box::new(http::HttpEmbedder::new(
                config.http_base_url.clone(),
                config.http_model.clone(),
                config.request_timeout_secs,
            )),
            // No accelerated library is linked on this build; an explicit
            // override still lands on the always-available fallback
            BackendKind::Accelerated | BackendKind::Hash => Box::new(HashBackend {
                dims: config.hash_dimensions,
            }),
        };

        info!("Embedding backend selected: {}", backend.kind().as_str());
        Self {
            backend,
            hash_dims: config.hash_dimensions,
        }
    }

    async fn detect(config: &EmbeddingConfig) -> BackendKind {
        if accelerated_available() {
            return BackendKind::Accelerated;
        }

        if http::HttpEmbedder::probe(&config.http_base_url, config.probe_timeout_ms).await {
            info!("Local embedding service detected at {}", config.http_base_url);
            return BackendKind::Http;
        }

        info!("Using hash embedding fallback");
        BackendKind::Hash
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: self.backend.kind(),
            dimensions: self.hash_dims,
        }
    }

    /// Embed one text. All outputs are L2-normalized so similarity reduces
    /// to a dot product.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match self.backend.embed(text).await {
            Ok(mut vec) => {
                l2_normalize(&mut vec);
                vec
            }
            Err(e) => {
                warn!("{} embedding failed, using hash fallback: {e}", self.backend.kind().as_str());
                hash_embed(text, self.hash_dims)
            }
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

/// Whether a hardware-accelerated embedding library is linked in.
fn accelerated_available() -> bool {
    cfg!(feature = "accelerated-embeddings")
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity. Vectors of different lengths compare as 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_symmetric() {
        let a = hash_embed("first text", 64);
        let b = hash_embed("second text", 64);
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let a = hash_embed("identical", 64);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_compare_as_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn hash_backend_embeds_without_io() {
        let config = EmbeddingConfig {
            backend_override: Some("hash".to_string()),
            http_base_url: "http://127.0.0.1:1".to_string(),
            http_model: "unused".to_string(),
            probe_timeout_ms: 10,
            request_timeout_secs: 1,
            hash_dimensions: 128,
        };
        let embedder = Embedder::init(&config).await;
        assert_eq!(embedder.info().backend, BackendKind::Hash);

        let vec = embedder.embed("hello").await;
        assert_eq!(vec.len(), 128);
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let config = EmbeddingConfig {
            backend_override: Some("hash".to_string()),
            http_base_url: "http://127.0.0.1:1".to_string(),
            http_model: "unused".to_string(),
            probe_timeout_ms: 10,
            request_timeout_secs: 1,
            hash_dimensions: 64,
        };
        let embedder = Embedder::init(&config).await;

        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed_batch(&texts).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed("alpha").await);
        assert_eq!(vectors[1], embedder.embed("beta").await);
    }

    #[tokio::test]
    async fn unreachable_http_backend_degrades_per_call() {
        // Nothing listens on port 1; every call must fall back to hash
        let config = EmbeddingConfig {
            backend_override: Some("http".to_string()),
            http_base_url: "http://127.0.0.1:1".to_string(),
            http_model: "unused".to_string(),
            probe_timeout_ms: 10,
            request_timeout_secs: 1,
            hash_dimensions: 64,
        };
        let embedder = Embedder::init(&config).await;
        assert_eq!(embedder.info().backend, BackendKind::Http);

        let vec = embedder.embed("degrades gracefully").await;
        assert_eq!(vec, hash_embed("degrades gracefully", 64));
    }
}
