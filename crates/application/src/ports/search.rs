use async_trait::async_trait;

use auditvault_core::AppResult;
use auditvault_domain::{AuditLog, AuditLogFilter};

/// Port for the query-optimized search projection.
///
/// Indices are per `(tenant, day)`; adapters create missing indices with a
/// fixed mapping before writing. Document ids equal event ids, which makes
/// re-indexing after redelivery idempotent.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Writes one document.
    async fn index(&self, log: &AuditLog) -> AppResult<()>;

    /// Writes a batch, grouped per daily index.
    async fn bulk_index(&self, logs: &[AuditLog]) -> AppResult<()>;

    /// Runs a filtered query, newest first. A missing index yields an empty
    /// result, not an error.
    async fn search(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>>;
}
