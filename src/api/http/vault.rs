// src/api/http/vault.rs
// Encrypted team vault endpoints, gated by the permission cascade

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::auth::{ResourceKind, RouteFamily};
use crate::error::LumenError;
use crate::state::AppState;

async fn require_vault_permission(
    state: &Arc<AppState>,
    team_id: &str,
    item_id: &str,
    user_id: &str,
    permission_type: &str,
) -> ApiResult<()> {
    let decision = map_core(
        state,
        state
            .fabric
            .permissions
            .check(
                &state.fabric.teams,
                ResourceKind::Vault,
                item_id,
                team_id,
                user_id,
                permission_type,
            )
            .await,
    )?;

    if !decision.allowed {
        return Err(api_err(state, LumenError::forbidden(decision.reason)));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct CreateVaultItemRequest {
    pub name: String,
    pub item_type: String,
    pub content: String,
    pub mime_type: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<CreateVaultItemRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    map_core(
        &state,
        state
            .fabric
            .check_rate_limit(RouteFamily::Apply, &user.id, &user.id)
            .await,
    )?;

    // Creation is a write against the team's vault as a whole
    require_vault_permission(&state, &team_id, "team-vault", &user.id, "write").await?;

    let item_id = map_core(
        &state,
        state
            .fabric
            .vault
            .create_item(
                &team_id,
                &req.name,
                &req.item_type,
                &req.content,
                &user.id,
                req.mime_type.as_deref(),
                req.metadata.as_ref(),
            )
            .await,
    )?;

    Ok(envelope(json!({ "item_id": item_id }), "Vault item created"))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_vault_permission(&state, &team_id, "team-vault", &user.id, "read").await?;

    let items = map_core(&state, state.fabric.vault.list_items(&team_id).await)?;
    Ok(envelope(items, "Vault items listed"))
}

pub async fn read_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((team_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_vault_permission(&state, &team_id, &item_id, &user.id, "read").await?;

    let item = map_core(&state, state.fabric.vault.get_item(&team_id, &item_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("vault item {item_id}"))))?;
    let content = map_core(
        &state,
        state.fabric.vault.read_content(&team_id, &item_id, &user.id).await,
    )?;

    Ok(envelope(
        json!({ "item": item, "content": content }),
        "Vault item decrypted",
    ))
}

#[derive(Deserialize)]
pub struct UpdateVaultItemRequest {
    pub content: String,
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((team_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateVaultItemRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_vault_permission(&state, &team_id, &item_id, &user.id, "write").await?;

    map_core(
        &state,
        state
            .fabric
            .vault
            .update_item(&team_id, &item_id, &req.content, &user.id)
            .await,
    )?;

    Ok(envelope(json!({ "updated": true }), "Vault item updated"))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((team_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_vault_permission(&state, &team_id, &item_id, &user.id, "admin").await?;

    map_core(
        &state,
        state.fabric.vault.delete_item(&team_id, &item_id, &user.id).await,
    )?;

    Ok(envelope(json!({ "deleted": true }), "Vault item deleted"))
}
