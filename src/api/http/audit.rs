// src/api/http/audit.rs
// Read-only audit surface for operators

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::error::LumenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub action: Option<String>,
}

/// Recent audit entries, newest first. Founder Rights only - the audit log
/// records every user's authorization history.
pub async fn recent_entries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let founder = map_core(&state, state.fabric.teams.has_founder_rights(&user.id).await)?;
    if !founder {
        return Err(api_err(
            &state,
            LumenError::forbidden("audit access requires Founder Rights"),
        ));
    }

    let limit = query.limit.unwrap_or(50).min(500);
    let entries = match query.action {
        Some(action) => map_core(&state, state.fabric.audit.by_action(&action, limit).await)?,
        None => map_core(&state, state.fabric.audit.recent(limit).await)?,
    };

    Ok(envelope(entries, "Audit entries listed"))
}
