// src/api/http/health.rs

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine_stats = state.context_engine.stats();
    let backend = state.embedder.info();

    Json(json!({
        "data": {
            "status": "ok",
            "environment": state.config.server.environment,
            "embedding": backend,
            "context_engine": engine_stats,
        },
        "message": "healthy",
    }))
}
