// src/auth/teams.rs
// Team CRUD, membership, Founder Rights records

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::cache::PermissionCache;
use super::models::{Team, TeamMember, TeamRole};

const ID_SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct TeamService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
    cache: Arc<PermissionCache>,
}

impl TeamService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>, cache: Arc<PermissionCache>) -> Self {
        Self { db, audit, cache }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Team id derived from the name plus a random suffix:
    /// `TEAMNAME-XXXXX`. Retries until unique.
    pub async fn generate_team_id(&self, team_name: &str) -> LumenResult<String> {
        let clean: String = team_name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(20)
            .collect::<String>()
            .to_uppercase();

        loop {
            let suffix: String = {
                let mut rng = rand::rng();
                (0..5)
                    .map(|_| ID_SUFFIX_CHARS[rng.random_range(0..ID_SUFFIX_CHARS.len())] as char)
                    .collect()
            };
            let team_id = format!("{clean}-{suffix}");

            let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM teams WHERE team_id = ?")
                .bind(&team_id)
                .fetch_one(&self.db)
                .await?;
            if exists.0 == 0 {
                return Ok(team_id);
            }
        }
    }

    /// Create a team with the creator as its first super admin.
    pub async fn create_team(
        &self,
        name: &str,
        creator_user_id: &str,
        description: Option<&str>,
    ) -> LumenResult<Team> {
        if name.trim().is_empty() {
            return Err(LumenError::validation("team name must not be empty"));
        }

        let team_id = self.generate_team_id(name).await?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO teams (team_id, name, description, created_at, created_by) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&team_id)
        .bind(name)
        .bind(description)
        .bind(fmt_ts(now))
        .bind(creator_user_id)
        .execute(&self.db)
        .await?;

        self.add_member(&team_id, creator_user_id, TeamRole::SuperAdmin)
            .await?;

        self.audit
            .log(creator_user_id, "team_created", Some("team"), Some(&team_id), None, name)
            .await?;

        info!("Created team {team_id}");
        Ok(Team {
            team_id,
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: now,
            created_by: creator_user_id.to_string(),
        })
    }

    pub async fn get_team(&self, team_id: &str) -> LumenResult<Option<Team>> {
        let row = sqlx::query(
            "SELECT team_id, name, description, created_at, created_by FROM teams WHERE team_id = ?",
        )
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|row| Team {
            team_id: row.get("team_id"),
            name: row.get("name"),
            description: row.get("description"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            created_by: row.get("created_by"),
        }))
    }

    pub async fn add_member(
        &self,
        team_id: &str,
        user_id: &str,
        role: TeamRole,
    ) -> LumenResult<()> {
        let now = fmt_ts(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO team_members (team_id, user_id, role, job_role, joined_at, last_seen)
            VALUES (?, ?, ?, 'unassigned', ?, ?)
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::conflict(format!(
                "user {user_id} is already a member of {team_id}"
            )));
        }

        self.cache.invalidate_member(team_id, user_id);
        Ok(())
    }

    pub async fn get_member(&self, team_id: &str, user_id: &str) -> LumenResult<Option<TeamMember>> {
        if let Some(cached) = self.cache.get_member(team_id, user_id) {
            return Ok(cached);
        }

        let row = sqlx::query(
            r#"
            SELECT team_id, user_id, role, job_role, joined_at, last_seen
            FROM team_members
            WHERE team_id = ? AND user_id = ?
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let member = row.map(Self::row_to_member).transpose()?;
        self.cache.put_member(team_id, user_id, member.clone());
        Ok(member)
    }

    /// Drop any cached lookups for a member. Role mutations that bypass
    /// this service call it after their write lands.
    pub fn invalidate_member_cache(&self, team_id: &str, user_id: &str) {
        self.cache.invalidate_member(team_id, user_id);
    }

    pub async fn get_team_members(&self, team_id: &str) -> LumenResult<Vec<TeamMember>> {
        let rows = sqlx::query(
            r#"
            SELECT team_id, user_id, role, job_role, joined_at, last_seen
            FROM team_members
            WHERE team_id = ?
            ORDER BY joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::row_to_member).collect()
    }

    pub async fn get_user_teams(&self, user_id: &str) -> LumenResult<Vec<Team>> {
        let rows = sqlx::query(
            r#"
            SELECT t.team_id, t.name, t.description, t.created_at, t.created_by
            FROM teams t
            JOIN team_members m ON m.team_id = t.team_id
            WHERE m.user_id = ?
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Team {
                team_id: row.get("team_id"),
                name: row.get("name"),
                description: row.get("description"),
                created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
                created_by: row.get("created_by"),
            })
            .collect())
    }

    pub async fn team_size(&self, team_id: &str) -> LumenResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
            .bind(team_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count.0)
    }

    pub async fn count_role(&self, team_id: &str, role: TeamRole) -> LumenResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = ? AND role = ?")
                .bind(team_id)
                .bind(role.as_str())
                .fetch_one(&self.db)
                .await?;
        Ok(count.0)
    }

    /// Touched on every authenticated activity.
    pub async fn update_last_seen(&self, team_id: &str, user_id: &str) -> LumenResult<()> {
        sqlx::query("UPDATE team_members SET last_seen = ? WHERE team_id = ? AND user_id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(team_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        self.cache.invalidate_member(team_id, user_id);
        Ok(())
    }

    /// Job roles are the orthogonal grant axis used by the permission
    /// cascade (e.g. "doctor", "nurse").
    pub async fn update_job_role(
        &self,
        team_id: &str,
        user_id: &str,
        job_role: &str,
    ) -> LumenResult<()> {
        if job_role.trim().is_empty() {
            return Err(LumenError::validation("job role must not be empty"));
        }

        let result =
            sqlx::query("UPDATE team_members SET job_role = ? WHERE team_id = ? AND user_id = ?")
                .bind(job_role)
                .bind(team_id)
                .bind(user_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!(
                "user {user_id} is not a member of {team_id}"
            )));
        }

        self.cache.invalidate_member(team_id, user_id);
        self.audit
            .log(user_id, "job_role_updated", Some("team"), Some(team_id), None, job_role)
            .await?;
        Ok(())
    }

    // =====================================
    // FOUNDER RIGHTS
    // =====================================

    /// Process-wide privilege flag: overrides every role check, role cap,
    /// and per-resource permission decision.
    pub async fn has_founder_rights(&self, user_id: &str) -> LumenResult<bool> {
        if let Some(cached) = self.cache.get_founder(user_id) {
            return Ok(cached);
        }

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM founder_rights WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let flag = count.0 > 0;
        self.cache.put_founder(user_id, flag);
        Ok(flag)
    }

    pub async fn grant_founder_rights(
        &self,
        user_id: &str,
        delegated_by: Option<&str>,
        notes: Option<&str>,
    ) -> LumenResult<()> {
        if let Some(delegator) = delegated_by {
            if !self.has_founder_rights(delegator).await? {
                return Err(LumenError::forbidden(format!(
                    "delegator {delegator} does not have Founder Rights"
                )));
            }
        }

        let now = fmt_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO founder_rights (user_id, delegated_by, created_at, is_active, notes)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                is_active = 1,
                revoked_at = NULL,
                delegated_by = excluded.delegated_by
            "#,
        )
        .bind(user_id)
        .bind(delegated_by)
        .bind(&now)
        .bind(notes)
        .execute(&self.db)
        .await?;

        self.cache.invalidate_founder(user_id);
        self.audit
            .log(
                delegated_by.unwrap_or(user_id),
                "founder_rights_granted",
                Some("user"),
                Some(user_id),
                None,
                notes.unwrap_or(""),
            )
            .await?;
        Ok(())
    }

    pub async fn revoke_founder_rights(&self, user_id: &str, revoked_by: &str) -> LumenResult<()> {
        let result = sqlx::query(
            "UPDATE founder_rights SET is_active = 0, revoked_at = ? WHERE user_id = ? AND is_active = 1",
        )
        .bind(fmt_ts(Utc::now()))
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!(
                "user {user_id} has no active Founder Rights"
            )));
        }

        self.cache.invalidate_founder(user_id);
        self.audit
            .log(revoked_by, "founder_rights_revoked", Some("user"), Some(user_id), None, "")
            .await?;
        Ok(())
    }

    fn row_to_member(row: sqlx::sqlite::SqliteRow) -> LumenResult<TeamMember> {
        let role: String = row.get("role");
        Ok(TeamMember {
            team_id: row.get("team_id"),
            user_id: row.get("user_id"),
            role: TeamRole::from_str(&role)?,
            job_role: row.get("job_role"),
            joined_at: parse_ts(row.get::<String, _>("joined_at").as_str()),
            last_seen: parse_ts(row.get::<String, _>("last_seen").as_str()),
        })
    }
}
