// src/api/http/teams.rs
// Teams, invites, roles, promotions, and permission grants

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiResult, api_err, authenticate, client_ip, envelope, map_core};
use crate::auth::models::GrantType;
use crate::auth::{ApprovalCeremony, ResourceKind, RouteFamily, TeamRole};
use crate::error::LumenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let team = map_core(
        &state,
        state
            .fabric
            .teams
            .create_team(&req.name, &user.id, req.description.as_deref())
            .await,
    )?;

    let invite = map_core(
        &state,
        state.fabric.invites.regenerate(&team.team_id, &user.id).await,
    )?;

    Ok(envelope(
        json!({ "team": team, "invite_code": invite.code }),
        "Team created",
    ))
}

pub async fn list_my_teams(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let teams = map_core(&state, state.fabric.teams.get_user_teams(&user.id).await)?;
    Ok(envelope(teams, "Teams listed"))
}

pub async fn get_members(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_member(&state, &team_id, &user.id).await?;
    map_core(&state, state.fabric.teams.update_last_seen(&team_id, &user.id).await)?;

    let members = map_core(&state, state.fabric.teams.get_team_members(&team_id).await)?;
    Ok(envelope(members, "Members listed"))
}

// =====================================
// INVITES
// =====================================

pub async fn regenerate_invite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::Admin).await?;

    let invite = map_core(&state, state.fabric.invites.regenerate(&team_id, &user.id).await)?;
    Ok(envelope(invite, "Invite code regenerated"))
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub invite_code: String,
}

pub async fn join_team(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;
    let ip = client_ip(&headers);

    map_core(
        &state,
        state
            .fabric
            .check_rate_limit(RouteFamily::Auth, &user.id, &ip)
            .await,
    )?;

    let team_id = map_core(
        &state,
        state
            .fabric
            .invites
            .redeem(&state.fabric.teams, &req.invite_code, &user.id, &ip)
            .await,
    )?;

    Ok(envelope(json!({ "team_id": team_id }), "Joined team as guest"))
}

// =====================================
// ROLES & PROMOTIONS
// =====================================

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub user_id: String,
    pub role: String,
}

pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::Admin).await?;

    let new_role =
        TeamRole::from_str(&req.role).map_err(|e| api_err(&state, e))?;
    let founder = map_core(&state, state.fabric.teams.has_founder_rights(&user.id).await)?;

    let (ok, message) = map_core(
        &state,
        state
            .fabric
            .roles
            .update_member_role(&state.fabric.teams, &team_id, &req.user_id, new_role, &user.id, founder)
            .await,
    )?;

    if !ok {
        return Err(api_err(&state, LumenError::conflict(message)));
    }
    Ok(envelope(json!({ "updated": true }), &message))
}

#[derive(Deserialize)]
pub struct PromoteGuestRequest {
    pub user_id: String,
    /// "real" or "decoy" - which authentication ceremony approved this
    pub ceremony: String,
}

pub async fn promote_guest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<PromoteGuestRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::Admin).await?;

    let ceremony = match req.ceremony.as_str() {
        "real" => ApprovalCeremony::Real,
        "decoy" => ApprovalCeremony::Decoy,
        other => {
            return Err(api_err(
                &state,
                LumenError::validation(format!("unknown ceremony: {other}")),
            ));
        }
    };

    let (ok, message) = map_core(
        &state,
        state
            .fabric
            .roles
            .instant_promote_guest(&state.fabric.teams, &team_id, &req.user_id, &user.id, ceremony)
            .await,
    )?;

    if !ok {
        return Err(api_err(&state, LumenError::conflict(message)));
    }
    Ok(envelope(json!({ "promoted": true }), &message))
}

/// Execute due delayed and automatic promotions. Invoked by external
/// scheduling; there is no internal timer.
pub async fn run_promotion_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let founder = map_core(&state, state.fabric.teams.has_founder_rights(&user.id).await)?;
    if !founder {
        return Err(api_err(&state, LumenError::forbidden("sweep requires Founder Rights")));
    }

    let results = map_core(
        &state,
        state
            .fabric
            .roles
            .run_promotion_sweep(&state.fabric.teams, None)
            .await,
    )?;

    Ok(envelope(results, "Promotion sweep complete"))
}

#[derive(Deserialize)]
pub struct TempPromotionRequest {
    pub offline_super_admin_id: String,
}

pub async fn promote_admin_temporarily(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<TempPromotionRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::Admin).await?;

    let (ok, message) = map_core(
        &state,
        state
            .fabric
            .roles
            .promote_admin_temporarily(&state.fabric.teams, &team_id, &req.offline_super_admin_id, &user.id)
            .await,
    )?;

    if !ok {
        return Err(api_err(&state, LumenError::conflict(message)));
    }
    Ok(envelope(json!({ "promoted": true }), &message))
}

#[derive(Deserialize)]
pub struct TempPromotionDecision {
    pub temp_promotion_id: i64,
    pub approve: bool,
}

pub async fn resolve_temp_promotion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<TempPromotionDecision>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::SuperAdmin).await?;

    let (ok, message) = if req.approve {
        map_core(
            &state,
            state
                .fabric
                .roles
                .approve_temp_promotion(req.temp_promotion_id, &user.id)
                .await,
        )?
    } else {
        map_core(
            &state,
            state
                .fabric
                .roles
                .revert_temp_promotion(&state.fabric.teams, req.temp_promotion_id, &user.id)
                .await,
        )?
    };

    if !ok {
        return Err(api_err(&state, LumenError::conflict(message)));
    }
    Ok(envelope(json!({ "resolved": true }), &message))
}

// =====================================
// PERMISSION GRANTS
// =====================================

#[derive(Deserialize)]
pub struct GrantRequest {
    pub resource_kind: String,
    pub resource_id: String,
    pub permission_type: String,
    pub grant_type: String,
    pub grant_value: String,
}

pub async fn add_permission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    require_role(&state, &team_id, &user.id, TeamRole::Admin).await?;

    let kind = parse_kind(&state, &req.resource_kind)?;
    let grant_type = GrantType::from_str(&req.grant_type).map_err(|e| api_err(&state, e))?;

    map_core(
        &state,
        state
            .fabric
            .permissions
            .add_grant(
                kind,
                &req.resource_id,
                &team_id,
                &req.permission_type,
                grant_type,
                &req.grant_value,
                &user.id,
            )
            .await,
    )?;

    Ok(envelope(json!({ "granted": true }), "Permission granted"))
}

#[derive(Deserialize)]
pub struct CheckPermissionRequest {
    pub resource_kind: String,
    pub resource_id: String,
    pub permission_type: String,
}

pub async fn check_permission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(team_id): Path<String>,
    Json(req): Json<CheckPermissionRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let kind = parse_kind(&state, &req.resource_kind)?;
    let decision = map_core(
        &state,
        state
            .fabric
            .permissions
            .check(
                &state.fabric.teams,
                kind,
                &req.resource_id,
                &team_id,
                &user.id,
                &req.permission_type,
            )
            .await,
    )?;

    Ok(envelope(decision, "Permission checked"))
}

// =====================================
// HELPERS
// =====================================

fn parse_kind(state: &Arc<AppState>, raw: &str) -> ApiResult<ResourceKind> {
    match raw {
        "workflow" => Ok(ResourceKind::Workflow),
        "queue" => Ok(ResourceKind::Queue),
        "vault" => Ok(ResourceKind::Vault),
        other => Err(api_err(
            state,
            LumenError::validation(format!("unknown resource kind: {other}")),
        )),
    }
}

async fn require_member(
    state: &Arc<AppState>,
    team_id: &str,
    user_id: &str,
) -> ApiResult<()> {
    let member = map_core(state, state.fabric.teams.get_member(team_id, user_id).await)?;
    if member.is_none() && !map_core(state, state.fabric.teams.has_founder_rights(user_id).await)? {
        return Err(api_err(
            state,
            LumenError::forbidden("not a member of this team"),
        ));
    }
    Ok(())
}

async fn require_role(
    state: &Arc<AppState>,
    team_id: &str,
    user_id: &str,
    minimum: TeamRole,
) -> ApiResult<()> {
    if map_core(state, state.fabric.teams.has_founder_rights(user_id).await)? {
        return Ok(());
    }

    let member = map_core(state, state.fabric.teams.get_member(team_id, user_id).await)?
        .ok_or_else(|| api_err(state, LumenError::forbidden("not a member of this team")))?;

    if member.role < minimum {
        return Err(api_err(
            state,
            LumenError::forbidden(format!("requires {} or above", minimum.as_str())),
        ));
    }
    Ok(())
}
