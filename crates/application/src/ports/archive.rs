use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use auditvault_core::{AppResult, TenantId};
use auditvault_domain::AuditLog;

/// Immutable archive envelope written to the object store before any
/// deletion of the covered window.
#[derive(Debug, Clone, Serialize)]
pub struct LogArchive {
    pub tenant_id: TenantId,
    pub before_date: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
    pub log_count: usize,
    pub logs: Vec<AuditLog>,
}

impl LogArchive {
    #[must_use]
    pub fn new(tenant_id: TenantId, before_date: DateTime<Utc>, logs: Vec<AuditLog>) -> Self {
        Self {
            tenant_id,
            before_date,
            archived_at: Utc::now(),
            log_count: logs.len(),
            logs,
        }
    }
}

/// Port for long-term object storage of evicted events.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Writes the envelope and returns the object key.
    async fn store(&self, archive: &LogArchive) -> AppResult<String>;
}
