use std::sync::Arc;

use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::Tenant;

use crate::ports::TenantRepository;

/// Application service for tenant management.
#[derive(Clone)]
pub struct TenantService {
    tenants: Arc<dyn TenantRepository>,
}

impl TenantService {
    #[must_use]
    pub fn new(tenants: Arc<dyn TenantRepository>) -> Self {
        Self { tenants }
    }

    /// Creates a tenant with the default request budget.
    pub async fn create(&self, name: &str) -> AppResult<Tenant> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("tenant name is required".to_owned()));
        }
        self.tenants.create(name, Tenant::DEFAULT_RATE_LIMIT).await
    }

    pub async fn list(&self) -> AppResult<Vec<Tenant>> {
        self.tenants.list().await
    }

    /// The tenant's configured request budget, if the tenant exists.
    pub async fn rate_limit_for(&self, tenant_id: TenantId) -> AppResult<Option<i64>> {
        self.tenants.rate_limit_for(tenant_id).await
    }
}
