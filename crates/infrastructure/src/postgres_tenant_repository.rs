use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use auditvault_application::TenantRepository;
use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::Tenant;

/// PostgreSQL-backed tenant repository.
#[derive(Clone)]
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    rate_limit: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: TenantId::from_uuid(row.id),
            name: row.name,
            rate_limit: row.rate_limit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn create(&self, name: &str, rate_limit: i64) -> AppResult<Tenant> {
        let row = sqlx::query_as::<_, TenantRow>(
            "INSERT INTO tenants (name, rate_limit) VALUES ($1, $2) \
             RETURNING id, name, rate_limit, created_at, updated_at",
        )
        .bind(name)
        .bind(rate_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create tenant: {error}")))?;

        Ok(row.into())
    }

    async fn list(&self) -> AppResult<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, rate_limit, created_at, updated_at FROM tenants \
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenants: {error}")))?;

        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, rate_limit, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to fetch tenant: {error}")))?;

        Ok(row.map(Tenant::from))
    }

    async fn rate_limit_for(&self, tenant_id: TenantId) -> AppResult<Option<i64>> {
        let budget: Option<(i64,)> =
            sqlx::query_as("SELECT rate_limit FROM tenants WHERE id = $1")
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to fetch tenant rate limit: {error}"))
                })?;

        Ok(budget.map(|(rate_limit,)| rate_limit))
    }
}
