// src/auth/models.rs
// Users, teams, roles, invites, promotions, grants, vault items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team role ladder. Strictly ordered; Founder Rights is an orthogonal
/// process-wide flag, not a rung on this ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Guest,
    Member,
    Admin,
    SuperAdmin,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Guest => "guest",
            TeamRole::Member => "member",
            TeamRole::Admin => "admin",
            TeamRole::SuperAdmin => "super_admin",
        }
    }
}

impl std::str::FromStr for TeamRole {
    type Err = crate::error::LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(TeamRole::Guest),
            "member" => Ok(TeamRole::Member),
            "admin" => Ok(TeamRole::Admin),
            "super_admin" => Ok(TeamRole::SuperAdmin),
            other => Err(crate::error::LumenError::validation(format!(
                "unknown team role: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub team_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: String,
    pub user_id: String,
    pub role: TeamRole,
    pub job_role: String,
    pub joined_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCode {
    pub code: String,
    pub team_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedPromotion {
    pub id: i64,
    pub team_id: String,
    pub user_id: String,
    pub from_role: TeamRole,
    pub to_role: TeamRole,
    pub scheduled_at: DateTime<Utc>,
    pub execute_at: DateTime<Utc>,
    pub executed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempPromotionStatus {
    Active,
    Approved,
    Reverted,
}

impl TempPromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempPromotionStatus::Active => "active",
            TempPromotionStatus::Approved => "approved",
            TempPromotionStatus::Reverted => "reverted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempPromotion {
    pub id: i64,
    pub team_id: String,
    pub original_super_admin_id: String,
    pub promoted_admin_id: String,
    pub status: TempPromotionStatus,
    pub promoted_at: DateTime<Utc>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
}

/// Resource kinds that carry per-resource permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Workflow,
    Queue,
    Vault,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Workflow => "workflow",
            ResourceKind::Queue => "queue",
            ResourceKind::Vault => "vault",
        }
    }

    /// Valid permission types for this resource kind.
    pub fn permission_types(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Workflow => &["view", "edit", "delete", "assign"],
            ResourceKind::Queue => &["view", "manage", "assign"],
            ResourceKind::Vault => &["read", "write", "admin"],
        }
    }
}

/// Grant axis: a specific user, a job role, or a team role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    User,
    JobRole,
    Role,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::User => "user",
            GrantType::JobRole => "job_role",
            GrantType::Role => "role",
        }
    }
}

impl std::str::FromStr for GrantType {
    type Err = crate::error::LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(GrantType::User),
            "job_role" => Ok(GrantType::JobRole),
            "role" => Ok(GrantType::Role),
            other => Err(crate::error::LumenError::validation(format!(
                "unknown grant type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub team_id: String,
    pub permission_type: String,
    pub grant_type: GrantType,
    pub grant_value: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Outcome of a permission check, with the human-readable reason the audit
/// log records.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: String,
}

impl PermissionDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItem {
    pub item_id: String,
    pub team_id: String,
    pub name: String,
    pub item_type: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub is_deleted: bool,
    pub metadata: Option<serde_json::Value>,
}

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}
