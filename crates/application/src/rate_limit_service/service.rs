use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use auditvault_core::{AppResult, TenantId};

use super::ports::RateLimitStore;

/// Fixed-width rate-limit window.
pub const RATE_LIMIT_WINDOW_SECONDS: i64 = 60;

/// The two rate-limited key namespaces, partitioned by prefix inside one
/// logical key space.
#[derive(Debug, Clone, Copy)]
pub enum RateLimitScope<'a> {
    /// Keyed by client IP, applied before authentication.
    GlobalIp(&'a str),
    /// Keyed by tenant, applied after authentication.
    Tenant(TenantId),
}

impl RateLimitScope<'_> {
    fn key(&self) -> String {
        match self {
            Self::GlobalIp(ip) => format!("rate_limit:global:{ip}"),
            Self::Tenant(tenant_id) => format!("rate_limit:tenant:{tenant_id}"),
        }
    }
}

/// Outcome of one rate-limit check, carrying everything the response
/// headers need.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: i64,
    pub remaining: i64,
    /// Next window boundary, unix seconds on the wire.
    pub reset_at: DateTime<Utc>,
}

/// Application service for windowed request budgets.
///
/// Counter state lives entirely in the external substrate; the process
/// stays stateless. Store failures propagate so callers can apply the
/// fail-open policy.
#[derive(Clone)]
pub struct RateLimitService {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimitService {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Records an attempt for the scope and decides whether it fits the
    /// budget. The counter is incremented before the comparison, so the
    /// first attempt past the budget is the one rejected.
    pub async fn check(
        &self,
        scope: RateLimitScope<'_>,
        limit: i64,
    ) -> AppResult<RateLimitDecision> {
        let info = self
            .store
            .record_attempt(&scope.key(), RATE_LIMIT_WINDOW_SECONDS)
            .await?;

        Ok(RateLimitDecision {
            allowed: info.attempt_count <= limit,
            limit,
            remaining: (limit - info.attempt_count).max(0),
            reset_at: info.window_started_at + Duration::seconds(RATE_LIMIT_WINDOW_SECONDS),
        })
    }
}
