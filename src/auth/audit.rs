// src/auth/audit.rs
// Append-only audit log (audit_log.db)

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error::LumenResult;
use crate::memory::store::{fmt_ts, parse_ts};

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub ip: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Synchronous, append-only audit emission. Every authorization decision
/// and mutating action writes exactly one entry; no code path updates or
/// deletes them. Callers do not get their answer until the insert commits.
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn log(
        &self,
        user_id: &str,
        action: &str,
        resource: Option<&str>,
        resource_id: Option<&str>,
        ip: Option<&str>,
        details: &str,
    ) -> LumenResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_entries (user_id, action, resource, resource_id, ip, details, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(resource)
        .bind(resource_id)
        .bind(ip)
        .bind(details)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count(&self) -> LumenResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn recent(&self, limit: usize) -> LumenResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, resource, resource_id, ip, details, timestamp
            FROM audit_entries
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AuditEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                action: row.get("action"),
                resource: row.get("resource"),
                resource_id: row.get("resource_id"),
                ip: row.get("ip"),
                details: row.get("details"),
                timestamp: parse_ts(row.get::<String, _>("timestamp").as_str()),
            })
            .collect())
    }

    /// Entries matching an action, newest first. Used by tests and the
    /// admin surface.
    pub async fn by_action(&self, action: &str, limit: usize) -> LumenResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, resource, resource_id, ip, details, timestamp
            FROM audit_entries
            WHERE action = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(action)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AuditEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                action: row.get("action"),
                resource: row.get("resource"),
                resource_id: row.get("resource_id"),
                ip: row.get("ip"),
                details: row.get("details"),
                timestamp: parse_ts(row.get::<String, _>("timestamp").as_str()),
            })
            .collect())
    }
}
