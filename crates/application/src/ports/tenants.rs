use async_trait::async_trait;

use auditvault_core::{AppResult, TenantId};
use auditvault_domain::Tenant;

/// Port for tenant records.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Creates a tenant with the given name and request budget.
    async fn create(&self, name: &str, rate_limit: i64) -> AppResult<Tenant>;

    /// Lists all tenants.
    async fn list(&self) -> AppResult<Vec<Tenant>>;

    /// Fetches one tenant.
    async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>>;

    /// The tenant's configured events-per-minute budget, if the tenant
    /// exists. Sits on the request hot path, so adapters answer it without
    /// materializing the full record.
    async fn rate_limit_for(&self, tenant_id: TenantId) -> AppResult<Option<i64>>;
}
