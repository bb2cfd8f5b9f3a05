// src/state.rs
// Application state: all services, constructed in dependency order

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::auth::AuthFabric;
use crate::chat::ChatOrchestrator;
use crate::config::LumenConfig;
use crate::context_engine::ContextEngine;
use crate::embedding::Embedder;
use crate::error::{LumenError, LumenResult};
use crate::memory::ChatMemoryStore;
use crate::semantic::SemanticIndex;

/// Owns every service. `init` builds them leaves-first (embedder, store,
/// index, engine, fabric, orchestrator); `shutdown` reverses that order.
/// Request handlers receive this by `Arc`, never through a global.
pub struct AppState {
    pub config: LumenConfig,
    pub embedder: Arc<Embedder>,
    pub memory: Arc<ChatMemoryStore>,
    pub semantic: Arc<SemanticIndex>,
    pub context_engine: Arc<ContextEngine>,
    pub fabric: Arc<AuthFabric>,
    pub chat: ChatOrchestrator,
}

impl AppState {
    pub async fn init(config: LumenConfig) -> LumenResult<Self> {
        let data_dir = PathBuf::from(&config.server.data_dir);
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| LumenError::internal(format!("cannot create data dir: {e}")))?;
        std::fs::create_dir_all(data_dir.join("uploads"))
            .map_err(|e| LumenError::internal(format!("cannot create uploads dir: {e}")))?;

        let embedder = Arc::new(Embedder::init(&config.embedding).await);

        let memory = Arc::new(
            ChatMemoryStore::open(&data_dir.join("chat_memory.db"), config.memory.clone()).await?,
        );

        let semantic = Arc::new(SemanticIndex::new(
            Arc::clone(&memory),
            Arc::clone(&embedder),
            config.semantic.clone(),
        ));

        let context_engine = Arc::new(ContextEngine::start(
            Arc::clone(&embedder),
            &config.context_engine,
        ));

        let fabric = Arc::new(
            AuthFabric::open(&data_dir, config.auth.clone(), &config.rate_limit).await?,
        );

        let chat = ChatOrchestrator::new(
            Arc::clone(&memory),
            Arc::clone(&semantic),
            Arc::clone(&embedder),
            Arc::clone(&context_engine),
            Arc::clone(&fabric),
            &config.upstream,
            &config.memory,
            &config.semantic,
        );

        info!("Application state initialized");
        Ok(Self {
            config,
            embedder,
            memory,
            semantic,
            context_engine,
            fabric,
            chat,
        })
    }

    pub async fn shutdown(&self) {
        self.context_engine.shutdown().await;
        info!("Application state shut down");
    }
}
