// src/auth/rate_limit.rs
// Keyed rate limiting at the fabric boundary

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovRateLimiter};

use crate::config::RateLimitConfig;
use crate::error::{LumenError, LumenResult};

type KeyedLimiter = GovRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate-limited route families. Chat streaming sits on the route family;
/// search and context queries on the context family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFamily {
    Route,
    Plan,
    Context,
    Apply,
    Auth,
    Register,
}

impl RouteFamily {
    fn name(&self) -> &'static str {
        match self {
            RouteFamily::Route => "route",
            RouteFamily::Plan => "plan",
            RouteFamily::Context => "context",
            RouteFamily::Apply => "apply",
            RouteFamily::Auth => "auth",
            RouteFamily::Register => "register",
        }
    }
}

fn per_minute(limit: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(limit.max(1)).expect("nonzero"))
}

fn per_hour(limit: u32) -> Quota {
    Quota::per_hour(NonZeroU32::new(limit.max(1)).expect("nonzero"))
}

/// One keyed limiter per route family. Keys are user ids for authenticated
/// routes, ip addresses for auth/registration.
pub struct FabricRateLimiter {
    route: KeyedLimiter,
    plan: KeyedLimiter,
    context: KeyedLimiter,
    apply: KeyedLimiter,
    auth: KeyedLimiter,
    register: KeyedLimiter,
}

impl FabricRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            route: GovRateLimiter::keyed(per_minute(config.route_per_min)),
            plan: GovRateLimiter::keyed(per_minute(config.plan_per_min)),
            context: GovRateLimiter::keyed(per_minute(config.context_per_min)),
            apply: GovRateLimiter::keyed(per_minute(config.apply_per_min)),
            auth: GovRateLimiter::keyed(per_minute(config.auth_per_min)),
            register: GovRateLimiter::keyed(per_hour(config.register_per_hour)),
        }
    }

    /// Check a request against its family. `bypass` is set for callers who
    /// hold the explicit bypass permission or Founder Rights.
    pub fn check(&self, family: RouteFamily, key: &str, bypass: bool) -> LumenResult<()> {
        if bypass {
            return Ok(());
        }

        let limiter = match family {
            RouteFamily::Route => &self.route,
            RouteFamily::Plan => &self.plan,
            RouteFamily::Context => &self.context,
            RouteFamily::Apply => &self.apply,
            RouteFamily::Auth => &self.auth,
            RouteFamily::Register => &self.register,
        };

        limiter.check_key(&key.to_string()).map_err(|_| {
            LumenError::RateLimited(format!("too many {} requests", family.name()))
        })
    }
}
