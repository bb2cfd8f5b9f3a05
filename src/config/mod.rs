// src/config/mod.rs
// Central configuration for the Lumen backend

pub mod auth;
pub mod embedding;
pub mod memory;
pub mod server;

use serde::{Deserialize, Serialize};

pub use auth::{AuthConfig, RateLimitConfig};
pub use embedding::EmbeddingConfig;
pub use memory::{ContextEngineConfig, MemoryConfig, SemanticConfig};
pub use server::{Environment, ServerConfig, UpstreamConfig};

/// Main configuration structure - composes all domain configs.
///
/// Constructed once in `main` and owned by `AppState`; services receive it
/// by reference rather than through a global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LumenConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub memory: MemoryConfig,
    pub semantic: SemanticConfig,
    pub embedding: EmbeddingConfig,
    pub context_engine: ContextEngineConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl LumenConfig {
    pub fn from_env() -> Self {
        // Don't panic if .env doesn't exist (for production)
        dotenvy::dotenv().ok();

        let server = ServerConfig::from_env();
        let rate_limit = RateLimitConfig::from_env(server.environment);

        Self {
            upstream: UpstreamConfig::from_env(),
            memory: MemoryConfig::from_env(),
            semantic: SemanticConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            context_engine: ContextEngineConfig::from_env(),
            auth: AuthConfig::from_env(),
            rate_limit,
            server,
        }
    }
}

impl Default for LumenConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Read an env var and parse it, falling back to a default.
pub(crate) fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read an env var as a string, falling back to a default.
pub(crate) fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
