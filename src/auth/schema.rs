// src/auth/schema.rs
// app.db and audit_log.db table definitions

use anyhow::Result;
use sqlx::SqlitePool;

/// Create the application tables (users, teams, permissions, vault).
pub async fn init_app(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            job_role TEXT NOT NULL DEFAULT 'unassigned',
            joined_at TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            FOREIGN KEY (team_id) REFERENCES teams (team_id),
            UNIQUE(team_id, user_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS invite_codes (
            code TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            used_by TEXT,
            used_at TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (team_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS invite_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            invite_code TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            attempted_at TEXT NOT NULL,
            success INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS delayed_promotions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            from_role TEXT NOT NULL,
            to_role TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            execute_at TEXT NOT NULL,
            executed INTEGER NOT NULL DEFAULT 0,
            executed_at TEXT,
            reason TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (team_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS temp_promotions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id TEXT NOT NULL,
            original_super_admin_id TEXT NOT NULL,
            promoted_admin_id TEXT NOT NULL,
            promoted_at TEXT NOT NULL,
            reverted_at TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            reason TEXT,
            approved_by TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (team_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS founder_rights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL UNIQUE,
            delegated_by TEXT,
            created_at TEXT NOT NULL,
            revoked_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS resource_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_kind TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            permission_type TEXT NOT NULL,
            grant_type TEXT NOT NULL,
            grant_value TEXT NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            FOREIGN KEY (team_id) REFERENCES teams (team_id),
            UNIQUE(resource_kind, resource_id, team_id, permission_type, grant_type, grant_value)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS queues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            queue_name TEXT NOT NULL,
            queue_type TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (team_id) REFERENCES teams (team_id),
            UNIQUE(queue_id, team_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vault_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            item_name TEXT NOT NULL,
            item_type TEXT NOT NULL,
            ciphertext TEXT NOT NULL,
            key_hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            mime_type TEXT,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            updated_at TEXT,
            updated_by TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            deleted_by TEXT,
            metadata TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (team_id),
            UNIQUE(item_id, team_id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_members_team ON team_members(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_members_user ON team_members(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_invites_team ON invite_codes(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_attempts_code_ip ON invite_attempts(invite_code, ip_address, attempted_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_delayed_team ON delayed_promotions(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_perms_resource ON resource_permissions(resource_kind, resource_id, team_id)",
        "CREATE INDEX IF NOT EXISTS idx_queues_team ON queues(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_vault_team ON vault_items(team_id)",
    ];

    for stmt in statements {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}

/// Create the append-only audit table.
pub async fn init_audit(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            action TEXT NOT NULL,
            resource TEXT,
            resource_id TEXT,
            ip TEXT,
            details TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_entries(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
