use std::sync::Arc;

use auditvault_application::{AuditLogService, RateLimitService, TenantService};

use crate::auth::JwtAuthenticator;
use crate::hub::LiveHub;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub audit_log_service: AuditLogService,
    pub tenant_service: TenantService,
    pub rate_limit_service: RateLimitService,
    pub authenticator: Arc<JwtAuthenticator>,
    pub live_hub: Arc<LiveHub>,
    /// Per-IP budget applied before authentication.
    pub global_rate_limit: i64,
    /// Fallback budget for tenants without a configured one.
    pub default_rate_limit: i64,
}
