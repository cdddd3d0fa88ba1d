use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use auditvault_core::TenantId;

/// Isolation unit. Every record and every queue message carries exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Events-per-minute budget applied by the tenant rate limiter.
    pub rate_limit: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Default per-tenant request budget when none is configured.
    pub const DEFAULT_RATE_LIMIT: i64 = 1000;
}
