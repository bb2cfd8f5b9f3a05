// src/api/http/sessions.rs
// Session CRUD and history

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::error::LumenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub title: Option<String>,
    pub model: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let model = req
        .model
        .unwrap_or_else(|| state.config.upstream.default_model.clone());
    let title = req.title.unwrap_or_else(|| "New Chat".to_string());

    let session = map_core(
        &state,
        state
            .memory
            .create_session(&user.id, &title, &model, req.team_id.as_deref())
            .await,
    )?;

    Ok(envelope(session, "Session created"))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let sessions = map_core(&state, state.memory.list_sessions(&user.id).await)?;
    Ok(envelope(sessions, "Sessions listed"))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let session = map_core(&state, state.memory.get_session(&session_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("session {session_id}"))))?;

    let decision = map_core(
        &state,
        state
            .fabric
            .can_use_chat(&user.id, &session.owner_user_id, &session_id)
            .await,
    )?;
    if !decision.allowed {
        return Err(api_err(&state, LumenError::forbidden(decision.reason)));
    }

    Ok(envelope(session, "Session found"))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let session = map_core(&state, state.memory.get_session(&session_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("session {session_id}"))))?;

    let decision = map_core(
        &state,
        state
            .fabric
            .can_use_chat(&user.id, &session.owner_user_id, &session_id)
            .await,
    )?;
    if !decision.allowed {
        return Err(api_err(&state, LumenError::forbidden(decision.reason)));
    }

    let limit = query.limit.unwrap_or(50).min(500);
    let messages = map_core(&state, state.memory.get_recent_messages(&session_id, limit).await)?;
    Ok(envelope(messages, "Messages listed"))
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let session = map_core(&state, state.memory.get_session(&session_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("session {session_id}"))))?;

    if session.owner_user_id != user.id {
        return Err(api_err(&state, LumenError::forbidden("not the session owner")));
    }

    let summary = map_core(&state, state.memory.get_summary(&session_id).await)?;
    Ok(envelope(summary, "Summary fetched"))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let session = map_core(&state, state.memory.get_session(&session_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("session {session_id}"))))?;

    let founder = map_core(&state, state.fabric.teams.has_founder_rights(&user.id).await)?;
    if session.owner_user_id != user.id && !founder {
        return Err(api_err(&state, LumenError::forbidden("not the session owner")));
    }

    map_core(&state, state.memory.delete_session(&session_id).await)?;
    Ok(envelope(serde_json::json!({ "id": session_id }), "Session deleted"))
}

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let analytics = map_core(&state, state.memory.analytics(None).await)?;
    Ok(envelope(analytics, "Analytics computed"))
}
