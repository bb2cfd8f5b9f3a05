// src/auth/permissions.rs
// Per-resource permission cascade for workflows, queues, and vault items

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::models::{GrantType, PermissionDecision, PermissionGrant, ResourceKind, TeamRole};
use super::teams::TeamService;

pub struct PermissionService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
}

impl PermissionService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>) -> Self {
        Self { db, audit }
    }

    pub async fn add_grant(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        team_id: &str,
        permission_type: &str,
        grant_type: GrantType,
        grant_value: &str,
        created_by: &str,
    ) -> LumenResult<()> {
        if !kind.permission_types().contains(&permission_type) {
            return Err(LumenError::validation(format!(
                "invalid permission type '{permission_type}' for {}; must be one of: {}",
                kind.as_str(),
                kind.permission_types().join(", ")
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO resource_permissions
                (resource_kind, resource_id, team_id, permission_type, grant_type, grant_value, created_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(resource_id)
        .bind(team_id)
        .bind(permission_type)
        .bind(grant_type.as_str())
        .bind(grant_value)
        .bind(fmt_ts(Utc::now()))
        .bind(created_by)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::conflict("permission already exists"));
        }

        self.audit
            .log(
                created_by,
                "permission_granted",
                Some(kind.as_str()),
                Some(resource_id),
                None,
                &format!("{permission_type}: {}={grant_value}", grant_type.as_str()),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_grant(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        team_id: &str,
        permission_type: &str,
        grant_type: GrantType,
        grant_value: &str,
        removed_by: &str,
    ) -> LumenResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_permissions
            WHERE resource_kind = ? AND resource_id = ? AND team_id = ?
              AND permission_type = ? AND grant_type = ? AND grant_value = ?
            "#,
        )
        .bind(kind.as_str())
        .bind(resource_id)
        .bind(team_id)
        .bind(permission_type)
        .bind(grant_type.as_str())
        .bind(grant_value)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found("permission not found"));
        }

        self.audit
            .log(
                removed_by,
                "permission_revoked",
                Some(kind.as_str()),
                Some(resource_id),
                None,
                &format!("{permission_type}: {}={grant_value}", grant_type.as_str()),
            )
            .await?;
        Ok(())
    }

    pub async fn list_grants(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        team_id: &str,
    ) -> LumenResult<Vec<PermissionGrant>> {
        let rows = sqlx::query(
            r#"
            SELECT permission_type, grant_type, grant_value, created_at, created_by
            FROM resource_permissions
            WHERE resource_kind = ? AND resource_id = ? AND team_id = ?
            ORDER BY permission_type, grant_type, grant_value
            "#,
        )
        .bind(kind.as_str())
        .bind(resource_id)
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let grant_type: String = row.get("grant_type");
                Ok(PermissionGrant {
                    resource_kind: kind,
                    resource_id: resource_id.to_string(),
                    team_id: team_id.to_string(),
                    permission_type: row.get("permission_type"),
                    grant_type: GrantType::from_str(&grant_type)?,
                    grant_value: row.get("grant_value"),
                    created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
                    created_by: row.get("created_by"),
                })
            })
            .collect()
    }

    /// The priority cascade. Evaluates in strict order and returns on first
    /// hit; emits exactly one audit entry regardless of outcome.
    ///
    /// 1. Founder Rights -> allow
    /// 2. Explicit user grant -> allow
    /// 3. Job-role grant -> allow
    /// 4. Team-role grant -> allow
    /// 5. Explicit grants exist but none matched -> deny
    /// 6. No explicit grants -> default matrix
    pub async fn check(
        &self,
        teams: &TeamService,
        kind: ResourceKind,
        resource_id: &str,
        team_id: &str,
        user_id: &str,
        permission_type: &str,
    ) -> LumenResult<PermissionDecision> {
        let decision = self
            .evaluate(teams, kind, resource_id, team_id, user_id, permission_type)
            .await?;

        self.audit
            .log(
                user_id,
                if decision.allowed { "permission_allowed" } else { "permission_denied" },
                Some(kind.as_str()),
                Some(resource_id),
                None,
                &format!("{permission_type}: {}", decision.reason),
            )
            .await?;

        debug!(
            "Permission check {} {} {}: {} ({})",
            kind.as_str(),
            resource_id,
            permission_type,
            decision.allowed,
            decision.reason
        );
        Ok(decision)
    }

    async fn evaluate(
        &self,
        teams: &TeamService,
        kind: ResourceKind,
        resource_id: &str,
        team_id: &str,
        user_id: &str,
        permission_type: &str,
    ) -> LumenResult<PermissionDecision> {
        if teams.has_founder_rights(user_id).await? {
            return Ok(PermissionDecision::allow("Founder Rights override"));
        }

        let Some(member) = teams.get_member(team_id, user_id).await? else {
            return Ok(PermissionDecision::deny("User not found in team"));
        };

        let grants = sqlx::query(
            r#"
            SELECT grant_type, grant_value FROM resource_permissions
            WHERE resource_kind = ? AND resource_id = ? AND team_id = ? AND permission_type = ?
            "#,
        )
        .bind(kind.as_str())
        .bind(resource_id)
        .bind(team_id)
        .bind(permission_type)
        .fetch_all(&self.db)
        .await?;

        if !grants.is_empty() {
            // user > job_role > role
            for grant in &grants {
                let grant_type: String = grant.get("grant_type");
                let grant_value: String = grant.get("grant_value");
                if grant_type == "user" && grant_value == user_id {
                    return Ok(PermissionDecision::allow("Explicit user grant"));
                }
            }
            for grant in &grants {
                let grant_type: String = grant.get("grant_type");
                let grant_value: String = grant.get("grant_value");
                if grant_type == "job_role" && grant_value == member.job_role {
                    return Ok(PermissionDecision::allow(format!(
                        "Job role grant ({})",
                        member.job_role
                    )));
                }
            }
            for grant in &grants {
                let grant_type: String = grant.get("grant_type");
                let grant_value: String = grant.get("grant_value");
                if grant_type == "role" && grant_value == member.role.as_str() {
                    return Ok(PermissionDecision::allow(format!("Role grant ({})", member.role)));
                }
            }

            return Ok(PermissionDecision::deny("No matching permission grant found"));
        }

        Ok(default_decision(kind, member.role, permission_type))
    }
}

/// The default matrix, indexed by resource kind and permission type, used
/// when a resource carries no explicit grants.
pub fn default_decision(
    kind: ResourceKind,
    role: TeamRole,
    permission_type: &str,
) -> PermissionDecision {
    let required = match (kind, permission_type) {
        (ResourceKind::Workflow, "view") => TeamRole::Member,
        (ResourceKind::Workflow, "edit") => TeamRole::Admin,
        (ResourceKind::Workflow, "delete") => TeamRole::SuperAdmin,
        (ResourceKind::Workflow, "assign") => TeamRole::Admin,
        (ResourceKind::Queue, "view") => TeamRole::Member,
        (ResourceKind::Queue, "manage") => TeamRole::Admin,
        (ResourceKind::Queue, "assign") => TeamRole::Admin,
        (ResourceKind::Vault, "read") => TeamRole::Member,
        (ResourceKind::Vault, "write") => TeamRole::Admin,
        (ResourceKind::Vault, "admin") => TeamRole::Admin,
        _ => {
            return PermissionDecision::deny(format!("Unknown permission type: {permission_type}"));
        }
    };

    if role >= required {
        PermissionDecision::allow(format!(
            "Default: {} and above can {permission_type}",
            level_name(required)
        ))
    } else {
        PermissionDecision::deny(format!(
            "Default: only {} and above can {permission_type}",
            level_name(required)
        ))
    }
}

fn level_name(role: TeamRole) -> &'static str {
    match role {
        TeamRole::Guest => "guests",
        TeamRole::Member => "members",
        TeamRole::Admin => "admins",
        TeamRole::SuperAdmin => "super admins",
    }
}
