// src/config/auth.rs
// Authorization fabric and rate limit configuration

use serde::{Deserialize, Serialize};

use super::{env_parsed, env_string, server::Environment};

/// Authorization fabric configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in days
    pub access_token_days: i64,
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
    /// Invite code lifetime in days
    pub invite_ttl_days: i64,
    /// Failed attempts before an invite code locks for an ip
    pub invite_lockout_attempts: i64,
    /// Brute-force counting window in minutes
    pub invite_lockout_window_mins: i64,
    /// Delay applied to decoy-approved promotions, in days
    pub delayed_promotion_days: i64,
    /// Tenure before a guest is auto-promoted, in days
    pub auto_promotion_days: i64,
    /// Minutes of silence before a super admin counts as offline
    pub offline_threshold_mins: i64,
    /// TTL of the member/founder permission cache, in seconds
    pub permission_cache_ttl_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: env_string("LUMEN_JWT_SECRET", "lumen-dev-secret-change-me"),
            access_token_days: env_parsed("LUMEN_ACCESS_TOKEN_DAYS", 7),
            refresh_token_days: env_parsed("LUMEN_REFRESH_TOKEN_DAYS", 30),
            invite_ttl_days: env_parsed("LUMEN_INVITE_TTL_DAYS", 30),
            invite_lockout_attempts: env_parsed("LUMEN_INVITE_LOCKOUT_ATTEMPTS", 5),
            invite_lockout_window_mins: env_parsed("LUMEN_INVITE_LOCKOUT_WINDOW_MINS", 15),
            delayed_promotion_days: env_parsed("LUMEN_DELAYED_PROMOTION_DAYS", 21),
            auto_promotion_days: env_parsed("LUMEN_AUTO_PROMOTION_DAYS", 7),
            offline_threshold_mins: env_parsed("LUMEN_OFFLINE_THRESHOLD_MINS", 5),
            permission_cache_ttl_secs: env_parsed("LUMEN_PERMISSION_CACHE_TTL_SECS", 30),
        }
    }
}

/// Per-route rate limits, requests per minute unless noted.
/// Applied at the fabric boundary, not by the core algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub route_per_min: u32,
    pub plan_per_min: u32,
    pub context_per_min: u32,
    pub apply_per_min: u32,
    /// Authentication attempts per minute per ip
    pub auth_per_min: u32,
    /// Registrations per hour per ip
    pub register_per_hour: u32,
}

impl RateLimitConfig {
    pub fn from_env(environment: Environment) -> Self {
        // Development gets a looser auth limit so local iteration isn't painful
        let auth_default = if environment.is_production() { 10 } else { 30 };

        Self {
            route_per_min: env_parsed("LUMEN_RATE_ROUTE_PER_MIN", 60),
            plan_per_min: env_parsed("LUMEN_RATE_PLAN_PER_MIN", 30),
            context_per_min: env_parsed("LUMEN_RATE_CONTEXT_PER_MIN", 60),
            apply_per_min: env_parsed("LUMEN_RATE_APPLY_PER_MIN", 10),
            auth_per_min: env_parsed("LUMEN_RATE_AUTH_PER_MIN", auth_default),
            register_per_hour: env_parsed("LUMEN_RATE_REGISTER_PER_HOUR", 5),
        }
    }
}
