// src/config/memory.rs
// Memory store, semantic index, and context engine configuration

use serde::{Deserialize, Serialize};

use super::env_parsed;

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub sqlite_max_connections: u32,
    /// Events folded into each rolling summary
    pub summary_max_events: usize,
    /// Character cap on the persisted summary text
    pub summary_max_chars: usize,
    /// Messages pulled for the chat context window
    pub context_recent_messages: usize,
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        Self {
            sqlite_max_connections: env_parsed("LUMEN_SQLITE_MAX_CONNECTIONS", 8),
            summary_max_events: env_parsed("LUMEN_SUMMARY_MAX_EVENTS", 30),
            summary_max_chars: env_parsed("LUMEN_SUMMARY_MAX_CHARS", 1200),
            context_recent_messages: env_parsed("LUMEN_CONTEXT_RECENT_MESSAGES", 50),
        }
    }
}

/// Semantic index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Minimum content length (codepoints) to embed a message
    pub embed_min_chars: usize,
    /// Candidate rows scanned per search
    pub search_candidates: usize,
    /// Default similarity floor for message search
    pub similarity_threshold: f32,
    /// Search-result cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// Chunks returned per RAG lookup
    pub rag_top_k: usize,
}

impl SemanticConfig {
    pub fn from_env() -> Self {
        Self {
            embed_min_chars: env_parsed("LUMEN_EMBED_MIN_CHARS", 10),
            search_candidates: env_parsed("LUMEN_SEARCH_CANDIDATES", 200),
            similarity_threshold: env_parsed("LUMEN_SIMILARITY_THRESHOLD", 0.3),
            cache_ttl_secs: env_parsed("LUMEN_SEARCH_CACHE_TTL_SECS", 60),
            rag_top_k: env_parsed("LUMEN_RAG_TOP_K", 3),
        }
    }
}

/// Background vectorization engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEngineConfig {
    pub workers: usize,
    pub retention_days: f64,
    pub queue_capacity: usize,
    pub shutdown_timeout_secs: u64,
}

impl ContextEngineConfig {
    pub fn from_env() -> Self {
        Self {
            workers: env_parsed("CONTEXT_WORKERS", 2),
            retention_days: env_parsed("CONTEXT_RETENTION_DAYS", 30.0),
            queue_capacity: env_parsed("CONTEXT_QUEUE_CAPACITY", 256),
            shutdown_timeout_secs: env_parsed("CONTEXT_SHUTDOWN_TIMEOUT_SECS", 5),
        }
    }
}
