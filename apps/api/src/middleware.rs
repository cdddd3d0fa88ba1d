mod auth;
mod rate_limit;
mod security;

pub use auth::{RequiredRole, require_auth, require_role};
pub use rate_limit::{global_rate_limit, tenant_rate_limit};
pub use security::{MAX_BODY_BYTES, block_suspicious_patterns, enforce_size_and_type, sanitize_input};
