// src/api/http/search.rs
// Semantic search over messages and context-engine queries

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::auth::RouteFamily;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

pub async fn search_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    map_core(
        &state,
        state
            .fabric
            .check_rate_limit(RouteFamily::Context, &user.id, &user.id)
            .await,
    )?;

    let limit = req.limit.unwrap_or(10).min(100);
    let hits = map_core(
        &state,
        state
            .semantic
            .search(&req.query, limit, &user.id, req.threshold)
            .await,
    )?;

    Ok(envelope(hits, "Search complete"))
}

#[derive(Deserialize)]
pub struct SimilarContextRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

pub async fn search_similar_contexts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SimilarContextRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    map_core(
        &state,
        state
            .fabric
            .check_rate_limit(RouteFamily::Context, &user.id, &user.id)
            .await,
    )?;

    let results = state
        .context_engine
        .search_similar(&req.query, req.top_k.unwrap_or(5), req.threshold.unwrap_or(0.5))
        .await;

    Ok(envelope(results, "Similar contexts found"))
}
