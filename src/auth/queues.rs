// src/auth/queues.rs
// Team queue registry. Queues are team-scoped resources whose access is
// governed by the permission cascade.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::models::ResourceKind;
use super::permissions::PermissionService;
use super::teams::TeamService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub queue_id: String,
    pub team_id: String,
    pub name: String,
    pub queue_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub is_active: bool,
}

pub struct QueueService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
}

impl QueueService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>) -> Self {
        Self { db, audit }
    }

    /// Queue ids look like `TYPE-XXXXXXXX`.
    pub async fn create_queue(
        &self,
        team_id: &str,
        name: &str,
        queue_type: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> LumenResult<Queue> {
        if name.trim().is_empty() {
            return Err(LumenError::validation("queue name must not be empty"));
        }
        if queue_type.trim().is_empty() {
            return Err(LumenError::validation("queue type must not be empty"));
        }

        let queue_id = format!(
            "{}-{}",
            queue_type.to_uppercase(),
            &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO queues (queue_id, team_id, queue_name, queue_type, description, created_at, created_by, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(&queue_id)
        .bind(team_id)
        .bind(name)
        .bind(queue_type)
        .bind(description)
        .bind(fmt_ts(now))
        .bind(created_by)
        .execute(&self.db)
        .await?;

        self.audit
            .log(created_by, "queue_created", Some("queue"), Some(&queue_id), None, name)
            .await?;

        info!("Created queue {queue_id} in team {team_id}");
        Ok(Queue {
            queue_id,
            team_id: team_id.to_string(),
            name: name.to_string(),
            queue_type: queue_type.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: now,
            created_by: created_by.to_string(),
            is_active: true,
        })
    }

    pub async fn get_queue(&self, team_id: &str, queue_id: &str) -> LumenResult<Option<Queue>> {
        let row = sqlx::query(
            r#"
            SELECT queue_id, team_id, queue_name, queue_type, description, created_at, created_by, is_active
            FROM queues
            WHERE team_id = ? AND queue_id = ?
            "#,
        )
        .bind(team_id)
        .bind(queue_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Self::row_to_queue))
    }

    pub async fn list_queues(&self, team_id: &str) -> LumenResult<Vec<Queue>> {
        let rows = sqlx::query(
            r#"
            SELECT queue_id, team_id, queue_name, queue_type, description, created_at, created_by, is_active
            FROM queues
            WHERE team_id = ? AND is_active = 1
            ORDER BY queue_name
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Self::row_to_queue).collect())
    }

    /// Queues the user can access at `access_type`, filtered through the
    /// permission cascade one queue at a time.
    pub async fn accessible_queues(
        &self,
        teams: &TeamService,
        permissions: &PermissionService,
        team_id: &str,
        user_id: &str,
        access_type: &str,
    ) -> LumenResult<Vec<Queue>> {
        let mut accessible = Vec::new();

        for queue in self.list_queues(team_id).await? {
            let decision = permissions
                .check(teams, ResourceKind::Queue, &queue.queue_id, team_id, user_id, access_type)
                .await?;
            if decision.allowed {
                accessible.push(queue);
            }
        }

        Ok(accessible)
    }

    /// Deactivation hides the queue; grants stay in place for history.
    pub async fn deactivate_queue(
        &self,
        team_id: &str,
        queue_id: &str,
        deactivated_by: &str,
    ) -> LumenResult<()> {
        let result =
            sqlx::query("UPDATE queues SET is_active = 0 WHERE team_id = ? AND queue_id = ? AND is_active = 1")
                .bind(team_id)
                .bind(queue_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!("queue {queue_id}")));
        }

        self.audit
            .log(deactivated_by, "queue_deactivated", Some("queue"), Some(queue_id), None, "")
            .await?;
        Ok(())
    }

    fn row_to_queue(row: sqlx::sqlite::SqliteRow) -> Queue {
        Queue {
            queue_id: row.get("queue_id"),
            team_id: row.get("team_id"),
            name: row.get("queue_name"),
            queue_type: row.get("queue_type"),
            description: row.get("description"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            created_by: row.get("created_by"),
            is_active: row.get::<i64, _>("is_active") != 0,
        }
    }
}
