// tests/common/mod.rs
// Shared builders for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use lumen_backend::auth::AuthFabric;
use lumen_backend::config::{
    AuthConfig, ContextEngineConfig, EmbeddingConfig, MemoryConfig, RateLimitConfig, SemanticConfig,
};
use lumen_backend::embedding::Embedder;
use lumen_backend::memory::ChatMemoryStore;
use lumen_backend::semantic::SemanticIndex;

pub fn memory_config() -> MemoryConfig {
    MemoryConfig {
        sqlite_max_connections: 1,
        summary_max_events: 30,
        summary_max_chars: 1200,
        context_recent_messages: 50,
    }
}

pub fn semantic_config() -> SemanticConfig {
    SemanticConfig {
        embed_min_chars: 10,
        search_candidates: 200,
        similarity_threshold: 0.3,
        cache_ttl_secs: 60,
        rag_top_k: 3,
    }
}

pub fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        backend_override: Some("hash".to_string()),
        http_base_url: "http://127.0.0.1:1".to_string(),
        http_model: "unused".to_string(),
        probe_timeout_ms: 10,
        request_timeout_secs: 1,
        hash_dimensions: 128,
    }
}

pub fn engine_config() -> ContextEngineConfig {
    ContextEngineConfig {
        workers: 2,
        retention_days: 30.0,
        queue_capacity: 64,
        shutdown_timeout_secs: 5,
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        access_token_days: 7,
        refresh_token_days: 30,
        invite_ttl_days: 30,
        invite_lockout_attempts: 5,
        invite_lockout_window_mins: 15,
        delayed_promotion_days: 21,
        auto_promotion_days: 7,
        offline_threshold_mins: 5,
        permission_cache_ttl_secs: 30,
    }
}

pub fn rate_config() -> RateLimitConfig {
    RateLimitConfig {
        route_per_min: 1000,
        plan_per_min: 1000,
        context_per_min: 1000,
        apply_per_min: 1000,
        auth_per_min: 1000,
        register_per_hour: 1000,
    }
}

pub async fn store() -> Arc<ChatMemoryStore> {
    Arc::new(
        ChatMemoryStore::in_memory(memory_config())
            .await
            .expect("in-memory store"),
    )
}

pub async fn embedder() -> Arc<Embedder> {
    Arc::new(Embedder::init(&embedding_config()).await)
}

pub async fn semantic_index() -> (Arc<ChatMemoryStore>, Arc<SemanticIndex>, Arc<Embedder>) {
    let store = store().await;
    let embedder = embedder().await;
    let index = Arc::new(SemanticIndex::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        semantic_config(),
    ));
    (store, index, embedder)
}

pub async fn fabric() -> Arc<AuthFabric> {
    Arc::new(
        AuthFabric::in_memory(auth_config(), &rate_config())
            .await
            .expect("in-memory fabric"),
    )
}
