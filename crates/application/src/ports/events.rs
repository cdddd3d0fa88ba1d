use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use auditvault_core::{AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter, AuditLogStats};

/// Port for the primary, time-partitioned event store.
///
/// The ingestion service is the only writer on the create path; the cleanup
/// worker is the only deleter.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persists one event. Duplicate-id insertion signals `Conflict`.
    async fn create(&self, log: &AuditLog) -> AppResult<()>;

    /// Persists a batch atomically, chunked internally.
    async fn bulk_create(&self, logs: &[AuditLog]) -> AppResult<()>;

    /// Fetches one event within the tenant scope from the read replica.
    async fn find_by_id(&self, tenant_id: TenantId, id: Uuid) -> AppResult<Option<AuditLog>>;

    /// Lists events for pure time-range queries, newest first.
    async fn list(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>>;

    /// Aggregated counters; backed by the hourly rollup for windows of at
    /// most 24 hours and by the base table otherwise.
    async fn stats(&self, filter: &AuditLogFilter) -> AppResult<AuditLogStats>;

    /// All events with `timestamp < before` for one tenant (archive read).
    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLog>>;

    /// Deletes events with `timestamp < before`; returns the deleted count.
    async fn delete_before(&self, tenant_id: TenantId, before: DateTime<Utc>) -> AppResult<u64>;
}
