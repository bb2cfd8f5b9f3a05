// src/api/extract.rs
// Request helpers: bearer authentication, client ip, response envelope

use std::sync::Arc;

use axum::Json;
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::User;
use crate::error::{LumenError, LumenResult};
use crate::state::AppState;

use super::error::ApiError;

/// Resolve the bearer access token to an active user.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> LumenResult<User> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| LumenError::auth("missing bearer token"))?;

    state.fabric.users.authenticate(token).await
}

/// Best-effort client ip for rate limiting and audit context.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

/// Success envelope: `{"data": ..., "message": "..."}`.
pub fn envelope<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({ "data": data, "message": message }))
}

/// Convert a core error into the HTTP error for this deployment.
pub fn api_err(state: &AppState, err: LumenError) -> ApiError {
    ApiError::from_core(err, !state.config.server.environment.is_production())
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shorthand for handlers: run a fallible core operation and map errors.
pub fn map_core<T>(state: &Arc<AppState>, result: LumenResult<T>) -> ApiResult<T> {
    result.map_err(|e| api_err(state, e))
}
