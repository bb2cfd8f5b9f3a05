// src/api/http/queues.rs
// Team queues, access-filtered through the permission cascade

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::auth::{ResourceKind, TeamRole};
use crate::error::LumenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    pub queue_type: String,
    pub description: Option<String>,
}

pub async fn create_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<CreateQueueRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let member = map_core(&state, state.fabric.teams.get_member(&team_id, &user.id).await)?;
    let founder = map_core(&state, state.fabric.teams.has_founder_rights(&user.id).await)?;
    let is_admin = member.map(|m| m.role >= TeamRole::Admin).unwrap_or(false);
    if !is_admin && !founder {
        return Err(api_err(&state, LumenError::forbidden("only admins can create queues")));
    }

    let queue = map_core(
        &state,
        state
            .fabric
            .queues
            .create_queue(&team_id, &req.name, &req.queue_type, req.description.as_deref(), &user.id)
            .await,
    )?;

    Ok(envelope(queue, "Queue created"))
}

#[derive(Deserialize)]
pub struct AccessQuery {
    pub access_type: Option<String>,
}

/// List the queues the caller can access; defaults to view access.
pub async fn list_queues(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let access_type = query.access_type.unwrap_or_else(|| "view".to_string());
    let queues = map_core(
        &state,
        state
            .fabric
            .queues
            .accessible_queues(
                &state.fabric.teams,
                &state.fabric.permissions,
                &team_id,
                &user.id,
                &access_type,
            )
            .await,
    )?;

    Ok(envelope(queues, "Queues listed"))
}

pub async fn deactivate_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((team_id, queue_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let decision = map_core(
        &state,
        state
            .fabric
            .permissions
            .check(&state.fabric.teams, ResourceKind::Queue, &queue_id, &team_id, &user.id, "manage")
            .await,
    )?;
    if !decision.allowed {
        return Err(api_err(&state, LumenError::forbidden(decision.reason)));
    }

    map_core(
        &state,
        state.fabric.queues.deactivate_queue(&team_id, &queue_id, &user.id).await,
    )?;

    Ok(envelope(json!({ "deactivated": true }), "Queue deactivated"))
}
