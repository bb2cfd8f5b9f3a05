// src/auth/mod.rs
// Authorization fabric: users, teams, roles, invites, per-resource
// permissions, vault, rate limits, and the audit log that gates them all

pub mod audit;
pub mod cache;
pub mod invites;
pub mod jwt;
pub mod models;
pub mod password;
pub mod permissions;
pub mod queues;
pub mod rate_limit;
pub mod roles;
pub mod schema;
pub mod service;
pub mod teams;
pub mod vault;

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::config::{AuthConfig, RateLimitConfig};
use crate::error::{LumenError, LumenResult};

pub use audit::{AuditEntry, AuditLogger};
pub use cache::PermissionCache;
pub use invites::InviteService;
pub use models::{
    GrantType, PermissionDecision, ResourceKind, Team, TeamMember, TeamRole, User, VaultItem,
};
pub use permissions::PermissionService;
pub use queues::{Queue, QueueService};
pub use rate_limit::{FabricRateLimiter, RouteFamily};
pub use roles::{ApprovalCeremony, RoleService, max_super_admins};
pub use service::AuthService;
pub use teams::TeamService;
pub use vault::VaultService;

async fn open_pool(path: &Path, max_connections: u32) -> LumenResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .map_err(|e| LumenError::internal(format!("invalid database path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?)
}

/// The layered permission engine. Owns app.db and audit_log.db; every
/// mutating operation and authorization decision flows through here and
/// emits an audit entry before the answer is returned.
pub struct AuthFabric {
    pub users: AuthService,
    pub teams: TeamService,
    pub roles: RoleService,
    pub invites: InviteService,
    pub permissions: PermissionService,
    pub queues: QueueService,
    pub vault: VaultService,
    pub limits: FabricRateLimiter,
    pub audit: Arc<AuditLogger>,
}

impl AuthFabric {
    pub async fn open(
        data_dir: &Path,
        auth_config: AuthConfig,
        rate_config: &RateLimitConfig,
    ) -> LumenResult<Self> {
        let app_pool = open_pool(&data_dir.join("app.db"), 8).await?;
        let audit_pool = open_pool(&data_dir.join("audit_log.db"), 4).await?;

        schema::init_app(&app_pool)
            .await
            .map_err(|e| LumenError::internal(format!("app schema init failed: {e}")))?;
        schema::init_audit(&audit_pool)
            .await
            .map_err(|e| LumenError::internal(format!("audit schema init failed: {e}")))?;

        info!("Authorization fabric opened under {}", data_dir.display());
        Ok(Self::from_pools(app_pool, audit_pool, auth_config, rate_config))
    }

    /// In-memory fabric for tests.
    pub async fn in_memory(
        auth_config: AuthConfig,
        rate_config: &RateLimitConfig,
    ) -> LumenResult<Self> {
        let app_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        let audit_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        schema::init_app(&app_pool)
            .await
            .map_err(|e| LumenError::internal(format!("app schema init failed: {e}")))?;
        schema::init_audit(&audit_pool)
            .await
            .map_err(|e| LumenError::internal(format!("audit schema init failed: {e}")))?;

        Ok(Self::from_pools(app_pool, audit_pool, auth_config, rate_config))
    }

    fn from_pools(
        app_pool: SqlitePool,
        audit_pool: SqlitePool,
        auth_config: AuthConfig,
        rate_config: &RateLimitConfig,
    ) -> Self {
        let audit = Arc::new(AuditLogger::new(audit_pool));
        let cache = Arc::new(PermissionCache::new(auth_config.permission_cache_ttl_secs));

        Self {
            users: AuthService::new(app_pool.clone(), Arc::clone(&audit), auth_config.clone()),
            teams: TeamService::new(app_pool.clone(), Arc::clone(&audit), Arc::clone(&cache)),
            roles: RoleService::new(app_pool.clone(), Arc::clone(&audit), auth_config.clone()),
            invites: InviteService::new(app_pool.clone(), Arc::clone(&audit), auth_config.clone()),
            permissions: PermissionService::new(app_pool.clone(), Arc::clone(&audit)),
            queues: QueueService::new(app_pool.clone(), Arc::clone(&audit)),
            vault: VaultService::new(app_pool, Arc::clone(&audit)),
            limits: FabricRateLimiter::new(rate_config),
            audit,
        }
    }

    /// Authorize chat use on a session. Owners always pass, Founder Rights
    /// always pass; everyone else is denied. One audit entry either way.
    pub async fn can_use_chat(
        &self,
        user_id: &str,
        session_owner_id: &str,
        session_id: &str,
    ) -> LumenResult<PermissionDecision> {
        let decision = if user_id == session_owner_id {
            PermissionDecision::allow("Session owner")
        } else if self.teams.has_founder_rights(user_id).await? {
            PermissionDecision::allow("Founder Rights override")
        } else {
            PermissionDecision::deny("Not the session owner")
        };

        self.audit
            .log(
                user_id,
                if decision.allowed { "permission_allowed" } else { "permission_denied" },
                Some("chat"),
                Some(session_id),
                None,
                &format!("chat.use: {}", decision.reason),
            )
            .await?;

        Ok(decision)
    }

    /// Rate-limit a request. Founder Rights always bypass.
    pub async fn check_rate_limit(
        &self,
        family: RouteFamily,
        user_id: &str,
        key: &str,
    ) -> LumenResult<()> {
        let bypass = self.teams.has_founder_rights(user_id).await?;
        self.limits.check(family, key, bypass)
    }
}
