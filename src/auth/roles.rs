// src/auth/roles.rs
// Role updates and the three promotion paths: instant, delayed, automatic,
// plus the offline-super-admin temporary promotion failsafe

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::config::AuthConfig;
use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::models::{DelayedPromotion, TeamMember, TeamRole, TempPromotion, TempPromotionStatus};
use super::teams::TeamService;

/// Maximum super admins as a step function of team size.
pub fn max_super_admins(team_size: i64) -> i64 {
    match team_size {
        ..=5 => 1,
        6..=15 => 2,
        16..=30 => 3,
        31..=50 => 4,
        _ => 5,
    }
}

/// Which authentication ceremony approved a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalCeremony {
    /// The real ceremony: promotion takes effect immediately
    Real,
    /// The decoy ceremony: promotion is scheduled, not applied
    Decoy,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub user_id: String,
    pub team_id: String,
    pub to_role: TeamRole,
    pub promoted: bool,
    pub message: String,
}

pub struct RoleService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
    config: AuthConfig,
}

impl RoleService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>, config: AuthConfig) -> Self {
        Self { db, audit, config }
    }

    /// Whether the team can take another super admin. Founder Rights
    /// requesters bypass the cap.
    pub async fn can_promote_to_super_admin(
        &self,
        teams: &TeamService,
        team_id: &str,
        requester_has_founder_rights: bool,
    ) -> LumenResult<(bool, String)> {
        if requester_has_founder_rights {
            return Ok((true, "Founder Rights: no limits on Super Admin promotions".to_string()));
        }

        let team_size = teams.team_size(team_id).await?;
        // Active temp promotions don't count against the cap until approved
        let temp_active: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM temp_promotions WHERE team_id = ? AND status = 'active'",
        )
        .bind(team_id)
        .fetch_one(&self.db)
        .await?;
        let current = teams.count_role(team_id, TeamRole::SuperAdmin).await? - temp_active.0;
        let max_allowed = max_super_admins(team_size);

        if current >= max_allowed {
            return Ok((
                false,
                format!(
                    "Team already has maximum Super Admins ({current}/{max_allowed} for team size {team_size})"
                ),
            ));
        }

        Ok((true, format!("Can promote: {current}/{max_allowed} Super Admins")))
    }

    /// Update a member's role, enforcing the super-admin cap.
    pub async fn update_member_role(
        &self,
        teams: &TeamService,
        team_id: &str,
        user_id: &str,
        new_role: TeamRole,
        requester_id: &str,
        requester_has_founder_rights: bool,
    ) -> LumenResult<(bool, String)> {
        let member = teams
            .get_member(team_id, user_id)
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {user_id} not in team {team_id}")))?;

        if new_role == TeamRole::SuperAdmin && member.role != TeamRole::SuperAdmin {
            let (allowed, message) = self
                .can_promote_to_super_admin(teams, team_id, requester_has_founder_rights)
                .await?;
            if !allowed {
                self.audit
                    .log(requester_id, "role_update_denied", Some("team"), Some(team_id), None, &message)
                    .await?;
                return Ok((false, message));
            }
        }

        sqlx::query("UPDATE team_members SET role = ? WHERE team_id = ? AND user_id = ?")
            .bind(new_role.as_str())
            .bind(team_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        teams.invalidate_member_cache(team_id, user_id);

        let details = format!("{user_id}: {} -> {}", member.role, new_role);
        self.audit
            .log(requester_id, "role_updated", Some("team"), Some(team_id), None, &details)
            .await?;

        info!("Role updated in {team_id}: {details}");
        Ok((true, format!("Role updated to {new_role}")))
    }

    // =====================================
    // INSTANT PROMOTION (real ceremony)
    // =====================================

    /// Promote a guest to member immediately. Requires the real
    /// authentication ceremony by an admin-or-above approver; the decoy
    /// ceremony lands in `schedule_delayed_promotion` instead.
    pub async fn instant_promote_guest(
        &self,
        teams: &TeamService,
        team_id: &str,
        user_id: &str,
        approved_by: &str,
        ceremony: ApprovalCeremony,
    ) -> LumenResult<(bool, String)> {
        let member = teams
            .get_member(team_id, user_id)
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {user_id} not in team {team_id}")))?;

        if member.role != TeamRole::Guest {
            return Ok((false, format!("User is already {}, not a guest", member.role)));
        }

        if ceremony == ApprovalCeremony::Decoy {
            return self
                .schedule_delayed_promotion(teams, team_id, user_id, approved_by)
                .await;
        }

        let approver = teams
            .get_member(team_id, approved_by)
            .await?
            .ok_or_else(|| LumenError::forbidden("approver is not a team member"))?;
        if approver.role < TeamRole::Admin && !teams.has_founder_rights(approved_by).await? {
            return Err(LumenError::forbidden("only admins and above can approve promotions"));
        }

        self.update_member_role(teams, team_id, user_id, TeamRole::Member, approved_by, false)
            .await?;

        Ok((true, "Instantly promoted to member. Access granted from now forward.".to_string()))
    }

    // =====================================
    // DELAYED PROMOTION (decoy ceremony)
    // =====================================

    pub async fn schedule_delayed_promotion(
        &self,
        teams: &TeamService,
        team_id: &str,
        user_id: &str,
        approved_by: &str,
    ) -> LumenResult<(bool, String)> {
        let member = teams
            .get_member(team_id, user_id)
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {user_id} not in team {team_id}")))?;

        if member.role != TeamRole::Guest {
            return Ok((false, format!("User is already {}, not a guest", member.role)));
        }

        let pending: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM delayed_promotions WHERE team_id = ? AND user_id = ? AND executed = 0",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        if pending.0 > 0 {
            return Ok((false, "User already has a scheduled promotion".to_string()));
        }

        let now = Utc::now();
        let execute_at = now + Duration::days(self.config.delayed_promotion_days);

        sqlx::query(
            r#"
            INSERT INTO delayed_promotions
                (team_id, user_id, from_role, to_role, scheduled_at, execute_at, executed, reason)
            VALUES (?, ?, 'guest', 'member', ?, ?, 0, 'Decoy approval delay')
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(fmt_ts(now))
        .bind(fmt_ts(execute_at))
        .execute(&self.db)
        .await?;

        self.audit
            .log(
                approved_by,
                "promotion_scheduled",
                Some("team"),
                Some(team_id),
                None,
                &format!("{user_id} -> member at {}", fmt_ts(execute_at)),
            )
            .await?;

        Ok((
            true,
            format!(
                "Promotion scheduled in {} days",
                self.config.delayed_promotion_days
            ),
        ))
    }

    pub async fn pending_delayed_promotions(
        &self,
        team_id: Option<&str>,
    ) -> LumenResult<Vec<DelayedPromotion>> {
        let rows = match team_id {
            Some(team_id) => {
                sqlx::query(
                    r#"
                    SELECT id, team_id, user_id, from_role, to_role, scheduled_at, execute_at, executed, reason
                    FROM delayed_promotions
                    WHERE executed = 0 AND team_id = ?
                    ORDER BY scheduled_at ASC
                    "#,
                )
                .bind(team_id)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, team_id, user_id, from_role, to_role, scheduled_at, execute_at, executed, reason
                    FROM delayed_promotions
                    WHERE executed = 0
                    ORDER BY scheduled_at ASC
                    "#,
                )
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.into_iter()
            .map(|row| {
                let from_role: String = row.get("from_role");
                let to_role: String = row.get("to_role");
                Ok(DelayedPromotion {
                    id: row.get("id"),
                    team_id: row.get("team_id"),
                    user_id: row.get("user_id"),
                    from_role: TeamRole::from_str(&from_role)?,
                    to_role: TeamRole::from_str(&to_role)?,
                    scheduled_at: parse_ts(row.get::<String, _>("scheduled_at").as_str()),
                    execute_at: parse_ts(row.get::<String, _>("execute_at").as_str()),
                    executed: row.get::<i64, _>("executed") != 0,
                    reason: row.get("reason"),
                })
            })
            .collect()
    }

    // =====================================
    // SWEEP (invoked by external scheduling)
    // =====================================

    /// Execute due delayed promotions in FIFO scheduled-at order, then
    /// auto-promote guests whose tenure crossed the threshold.
    pub async fn run_promotion_sweep(
        &self,
        teams: &TeamService,
        team_id: Option<&str>,
    ) -> LumenResult<Vec<SweepResult>> {
        let mut results = Vec::new();
        let now = Utc::now();

        for promo in self.pending_delayed_promotions(team_id).await? {
            if promo.execute_at > now {
                continue;
            }

            let (promoted, message) = self
                .update_member_role(
                    teams,
                    &promo.team_id,
                    &promo.user_id,
                    promo.to_role,
                    "promotion-sweep",
                    false,
                )
                .await?;

            if promoted {
                sqlx::query("UPDATE delayed_promotions SET executed = 1, executed_at = ? WHERE id = ?")
                    .bind(fmt_ts(now))
                    .bind(promo.id)
                    .execute(&self.db)
                    .await?;
            }

            results.push(SweepResult {
                user_id: promo.user_id,
                team_id: promo.team_id,
                to_role: promo.to_role,
                promoted,
                message,
            });
        }

        results.extend(self.auto_promote_guests(teams, team_id).await?);
        Ok(results)
    }

    /// Guests who have been in the team at least `auto_promotion_days`
    /// become members.
    async fn auto_promote_guests(
        &self,
        teams: &TeamService,
        team_id: Option<&str>,
    ) -> LumenResult<Vec<SweepResult>> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(self.config.auto_promotion_days));

        let rows = match team_id {
            Some(team_id) => {
                sqlx::query(
                    "SELECT team_id, user_id FROM team_members WHERE role = 'guest' AND joined_at <= ? AND team_id = ?",
                )
                .bind(&cutoff)
                .bind(team_id)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT team_id, user_id FROM team_members WHERE role = 'guest' AND joined_at <= ?",
                )
                .bind(&cutoff)
                .fetch_all(&self.db)
                .await?
            }
        };

        let mut results = Vec::new();
        for row in rows {
            let team_id: String = row.get("team_id");
            let user_id: String = row.get("user_id");

            let (promoted, message) = self
                .update_member_role(teams, &team_id, &user_id, TeamRole::Member, "promotion-sweep", false)
                .await?;

            results.push(SweepResult {
                user_id,
                team_id,
                to_role: TeamRole::Member,
                promoted,
                message,
            });
        }

        Ok(results)
    }

    // =====================================
    // OFFLINE SUPER ADMIN FAILSAFE
    // =====================================

    /// Super admins whose last_seen is older than the offline threshold.
    pub async fn offline_super_admins(&self, team_id: &str) -> LumenResult<Vec<TeamMember>> {
        let threshold = fmt_ts(Utc::now() - Duration::minutes(self.config.offline_threshold_mins));

        let rows = sqlx::query(
            r#"
            SELECT team_id, user_id, role, job_role, joined_at, last_seen
            FROM team_members
            WHERE team_id = ? AND role = 'super_admin' AND last_seen < ?
            "#,
        )
        .bind(team_id)
        .bind(&threshold)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(TeamMember {
                    team_id: row.get("team_id"),
                    user_id: row.get("user_id"),
                    role: TeamRole::from_str(&role)?,
                    job_role: row.get("job_role"),
                    joined_at: parse_ts(row.get::<String, _>("joined_at").as_str()),
                    last_seen: parse_ts(row.get::<String, _>("last_seen").as_str()),
                })
            })
            .collect()
    }

    /// Temporarily promote the most senior admin (by joined_at) to super
    /// admin when an existing super admin has gone offline. At most one
    /// active temp promotion per team; the cap check is bypassed because
    /// the promotion is provisional until approved or reverted.
    pub async fn promote_admin_temporarily(
        &self,
        teams: &TeamService,
        team_id: &str,
        offline_super_admin_id: &str,
        requester_id: &str,
    ) -> LumenResult<(bool, String)> {
        let active: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM temp_promotions WHERE team_id = ? AND status = 'active'",
        )
        .bind(team_id)
        .fetch_one(&self.db)
        .await?;
        if active.0 > 0 {
            return Ok((false, "Team already has an active temporary promotion".to_string()));
        }

        let offline = self.offline_super_admins(team_id).await?;
        if !offline.iter().any(|m| m.user_id == offline_super_admin_id) {
            return Ok((
                false,
                format!("Super admin {offline_super_admin_id} is not offline"),
            ));
        }

        let senior = sqlx::query(
            r#"
            SELECT user_id FROM team_members
            WHERE team_id = ? AND role = 'admin'
            ORDER BY joined_at ASC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(senior) = senior else {
            return Ok((false, "No admins available for temporary promotion".to_string()));
        };
        let promoted_admin_id: String = senior.get("user_id");

        // Temp rows don't count against the cap, so bypass it here
        let (ok, message) = self
            .update_member_role(teams, team_id, &promoted_admin_id, TeamRole::SuperAdmin, requester_id, true)
            .await?;
        if !ok {
            return Ok((false, format!("Failed to promote admin: {message}")));
        }

        sqlx::query(
            r#"
            INSERT INTO temp_promotions
                (team_id, original_super_admin_id, promoted_admin_id, promoted_at, status, reason)
            VALUES (?, ?, ?, ?, 'active', ?)
            "#,
        )
        .bind(team_id)
        .bind(offline_super_admin_id)
        .bind(&promoted_admin_id)
        .bind(fmt_ts(Utc::now()))
        .bind(format!("Offline super admin failsafe: {offline_super_admin_id}"))
        .execute(&self.db)
        .await?;

        self.audit
            .log(requester_id, "temp_promotion_created", Some("team"), Some(team_id), None, &promoted_admin_id)
            .await?;

        info!("Temporarily promoted {promoted_admin_id} to super_admin in {team_id}");
        Ok((true, format!("Temporarily promoted {promoted_admin_id} to Super Admin")))
    }

    pub async fn active_temp_promotions(&self, team_id: &str) -> LumenResult<Vec<TempPromotion>> {
        let rows = sqlx::query(
            r#"
            SELECT id, team_id, original_super_admin_id, promoted_admin_id,
                   promoted_at, reverted_at, status, reason, approved_by
            FROM temp_promotions
            WHERE team_id = ? AND status = 'active'
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Self::row_to_temp_promotion).collect())
    }

    /// Make a temporary promotion permanent.
    pub async fn approve_temp_promotion(
        &self,
        temp_promotion_id: i64,
        approved_by: &str,
    ) -> LumenResult<(bool, String)> {
        let result = sqlx::query(
            "UPDATE temp_promotions SET status = 'approved', approved_by = ? WHERE id = ? AND status = 'active'",
        )
        .bind(approved_by)
        .bind(temp_promotion_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok((false, "Temp promotion not found or not active".to_string()));
        }

        self.audit
            .log(approved_by, "temp_promotion_approved", None, None, None, &temp_promotion_id.to_string())
            .await?;

        Ok((true, "Temporary promotion approved and made permanent".to_string()))
    }

    /// Revert a temporary promotion, demoting the admin back.
    pub async fn revert_temp_promotion(
        &self,
        teams: &TeamService,
        temp_promotion_id: i64,
        reverted_by: &str,
    ) -> LumenResult<(bool, String)> {
        let row = sqlx::query(
            "SELECT team_id, promoted_admin_id FROM temp_promotions WHERE id = ? AND status = 'active'",
        )
        .bind(temp_promotion_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok((false, "Temp promotion not found or not active".to_string()));
        };
        let team_id: String = row.get("team_id");
        let promoted_admin_id: String = row.get("promoted_admin_id");

        let (ok, message) = self
            .update_member_role(teams, &team_id, &promoted_admin_id, TeamRole::Admin, reverted_by, false)
            .await?;
        if !ok {
            return Ok((false, format!("Failed to demote: {message}")));
        }

        sqlx::query("UPDATE temp_promotions SET status = 'reverted', reverted_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(temp_promotion_id)
            .execute(&self.db)
            .await?;

        self.audit
            .log(reverted_by, "temp_promotion_reverted", Some("team"), Some(&team_id), None, &promoted_admin_id)
            .await?;

        Ok((true, format!("Reverted: {promoted_admin_id} demoted back to Admin")))
    }

    fn row_to_temp_promotion(row: sqlx::sqlite::SqliteRow) -> TempPromotion {
        let status: String = row.get("status");
        TempPromotion {
            id: row.get("id"),
            team_id: row.get("team_id"),
            original_super_admin_id: row.get("original_super_admin_id"),
            promoted_admin_id: row.get("promoted_admin_id"),
            status: match status.as_str() {
                "approved" => TempPromotionStatus::Approved,
                "reverted" => TempPromotionStatus::Reverted,
                _ => TempPromotionStatus::Active,
            },
            promoted_at: parse_ts(row.get::<String, _>("promoted_at").as_str()),
            reverted_at: row
                .get::<Option<String>, _>("reverted_at")
                .map(|raw| parse_ts(&raw)),
            approved_by: row.get("approved_by"),
            reason: row.get("reason"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_cap_is_a_step_function() {
        assert_eq!(max_super_admins(1), 1);
        assert_eq!(max_super_admins(5), 1);
        assert_eq!(max_super_admins(6), 2);
        assert_eq!(max_super_admins(15), 2);
        assert_eq!(max_super_admins(16), 3);
        assert_eq!(max_super_admins(30), 3);
        assert_eq!(max_super_admins(31), 4);
        assert_eq!(max_super_admins(50), 4);
        assert_eq!(max_super_admins(51), 5);
        assert_eq!(max_super_admins(1000), 5);
    }
}
