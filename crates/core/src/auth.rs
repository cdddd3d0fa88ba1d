use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TenantId;

/// Bearer-token claims carried by every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: String,
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Issued at, seconds since epoch.
    pub iat: i64,
}

/// Caller information extracted from verified claims and attached to the
/// request. Tenant scope for reads is always taken from here, never from
/// request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    user_id: String,
    tenant_id: TenantId,
    roles: Vec<String>,
}

impl CallerIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, tenant_id: TenantId, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id,
            roles,
        }
    }

    /// Returns the stable user identifier from the token.
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }

    /// Returns the tenant the caller is scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the roles granted to the caller.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.roles.as_slice()
    }
}

impl From<AuthClaims> for CallerIdentity {
    fn from(claims: AuthClaims) -> Self {
        Self {
            user_id: claims.user_id,
            tenant_id: TenantId::from_uuid(claims.tenant_id),
            roles: claims.roles,
        }
    }
}
