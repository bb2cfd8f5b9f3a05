// src/auth/invites.rs
// Invite code lifecycle: generation, redemption, brute-force lockout

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::models::{InviteCode, TeamRole};
use super::teams::TeamService;

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_group() -> String {
    let mut rng = rand::rng();
    (0..5)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// `XXXXX-XXXXX-XXXXX`
fn random_code() -> String {
    format!("{}-{}-{}", random_group(), random_group(), random_group())
}

pub struct InviteService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
    config: AuthConfig,
}

impl InviteService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>, config: AuthConfig) -> Self {
        Self { db, audit, config }
    }

    /// Generate a fresh invite code for a team, superseding any previously
    /// active codes in the same transaction. At most one code is active per
    /// team at any moment.
    pub async fn regenerate(&self, team_id: &str, created_by: &str) -> LumenResult<InviteCode> {
        let code = loop {
            let candidate = random_code();
            let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invite_codes WHERE code = ?")
                .bind(&candidate)
                .fetch_one(&self.db)
                .await?;
            if exists.0 == 0 {
                break candidate;
            }
        };

        let now = Utc::now();
        let expires_at = now + Duration::days(self.config.invite_ttl_days);

        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE invite_codes SET used = 1 WHERE team_id = ? AND used = 0")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO invite_codes (code, team_id, created_at, expires_at, used)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(&code)
        .bind(team_id)
        .bind(fmt_ts(now))
        .bind(fmt_ts(expires_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.audit
            .log(created_by, "invite_generated", Some("team"), Some(team_id), None, &code)
            .await?;

        info!("Generated invite code for team {team_id}");
        Ok(InviteCode {
            code,
            team_id: team_id.to_string(),
            created_at: now,
            expires_at,
            used: false,
            used_by: None,
            used_at: None,
        })
    }

    pub async fn active_code(&self, team_id: &str) -> LumenResult<Option<InviteCode>> {
        let row = sqlx::query(
            r#"
            SELECT code, team_id, created_at, expires_at, used, used_by, used_at
            FROM invite_codes
            WHERE team_id = ? AND used = 0 AND expires_at > ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(fmt_ts(Utc::now()))
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|row| InviteCode {
            code: row.get("code"),
            team_id: row.get("team_id"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            expires_at: parse_ts(row.get::<String, _>("expires_at").as_str()),
            used: row.get::<i64, _>("used") != 0,
            used_by: row.get("used_by"),
            used_at: row
                .get::<Option<String>, _>("used_at")
                .map(|raw| parse_ts(&raw)),
        }))
    }

    /// Whether this (code, ip) pair has crossed the failure threshold inside
    /// the counting window. Lookups during lockout never consult the code
    /// table, so a locked caller cannot distinguish lockout from a bad code.
    pub async fn is_locked_out(&self, code: &str, ip: &str) -> LumenResult<bool> {
        let window_start =
            Utc::now() - Duration::minutes(self.config.invite_lockout_window_mins);

        let failures: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM invite_attempts
            WHERE invite_code = ? AND ip_address = ? AND success = 0 AND attempted_at >= ?
            "#,
        )
        .bind(code)
        .bind(ip)
        .bind(fmt_ts(window_start))
        .fetch_one(&self.db)
        .await?;

        Ok(failures.0 >= self.config.invite_lockout_attempts)
    }

    async fn record_attempt(&self, code: &str, ip: &str, success: bool) -> LumenResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invite_attempts (invite_code, ip_address, attempted_at, success)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(code)
        .bind(ip)
        .bind(fmt_ts(Utc::now()))
        .bind(success as i64)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Validate a code without consuming it. Expired and used codes are
    /// indistinguishable from unknown ones: all answer None.
    pub async fn validate(&self, code: &str, ip: &str) -> LumenResult<Option<String>> {
        if self.is_locked_out(code, ip).await? {
            warn!("Invite code lookup while locked out (ip {ip})");
            self.audit
                .log("anonymous", "invite_locked", Some("invite"), Some(code), Some(ip), "")
                .await?;
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT team_id FROM invite_codes WHERE code = ? AND used = 0 AND expires_at > ?",
        )
        .bind(code)
        .bind(fmt_ts(Utc::now()))
        .fetch_optional(&self.db)
        .await?;

        let team_id: Option<String> = row.map(|r| r.get("team_id"));
        self.record_attempt(code, ip, team_id.is_some()).await?;

        self.audit
            .log(
                "anonymous",
                if team_id.is_some() { "invite_validated" } else { "invite_invalid" },
                Some("invite"),
                Some(code),
                Some(ip),
                "",
            )
            .await?;

        Ok(team_id)
    }

    /// Redeem a code: validate, atomically mark it used, and join the caller
    /// to the team as a guest. Concurrent redemptions of the same code have
    /// exactly one winner - the guarded UPDATE decides.
    pub async fn redeem(
        &self,
        teams: &TeamService,
        code: &str,
        user_id: &str,
        ip: &str,
    ) -> LumenResult<String> {
        if self.is_locked_out(code, ip).await? {
            self.audit
                .log(user_id, "invite_locked", Some("invite"), Some(code), Some(ip), "")
                .await?;
            return Err(LumenError::auth("invalid invite code"));
        }

        let now = fmt_ts(Utc::now());
        let row = sqlx::query(
            r#"
            UPDATE invite_codes
            SET used = 1, used_by = ?, used_at = ?
            WHERE code = ? AND used = 0 AND expires_at > ?
            RETURNING team_id
            "#,
        )
        .bind(user_id)
        .bind(&now)
        .bind(code)
        .bind(&now)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            self.record_attempt(code, ip, false).await?;
            self.audit
                .log(user_id, "invite_invalid", Some("invite"), Some(code), Some(ip), "")
                .await?;
            return Err(LumenError::auth("invalid invite code"));
        };

        let team_id: String = row.get("team_id");
        self.record_attempt(code, ip, true).await?;

        teams.add_member(&team_id, user_id, TeamRole::Guest).await?;

        self.audit
            .log(user_id, "invite_redeemed", Some("team"), Some(&team_id), Some(ip), code)
            .await?;

        info!("User {user_id} joined team {team_id} via invite");
        Ok(team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_format_is_three_hyphenated_groups() {
        let code = random_code();
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 3);
        for group in groups {
            assert_eq!(group.len(), 5);
            assert!(group.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
