// src/api/http/auth.rs
// Registration, login, token refresh

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiResult, api_err, client_ip, envelope, map_core};
use crate::auth::RouteFamily;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let ip = client_ip(&headers);
    state
        .fabric
        .limits
        .check(RouteFamily::Register, &ip, false)
        .map_err(|e| api_err(&state, e))?;

    let tokens = map_core(
        &state,
        state
            .fabric
            .users
            .register(&req.username, &req.password, req.email.as_deref(), Some(&ip))
            .await,
    )?;

    Ok(envelope(tokens, "Account created"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let ip = client_ip(&headers);
    state
        .fabric
        .limits
        .check(RouteFamily::Auth, &ip, false)
        .map_err(|e| api_err(&state, e))?;

    let tokens = map_core(
        &state,
        state
            .fabric
            .users
            .login(&req.username, &req.password, Some(&ip))
            .await,
    )?;

    Ok(envelope(tokens, "Logged in"))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<Value>> {
    let tokens = map_core(&state, state.fabric.users.refresh(&req.refresh_token).await)?;
    Ok(envelope(tokens, "Token refreshed"))
}
