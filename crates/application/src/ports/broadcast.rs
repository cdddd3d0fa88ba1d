use async_trait::async_trait;

use auditvault_domain::AuditLog;

/// Best-effort fan-out hook on the ingestion path.
///
/// Implemented by the live hub and late-bound onto the ingestion service
/// after both exist; a lost broadcast is backpressure, not an error.
#[async_trait]
pub trait LogBroadcaster: Send + Sync {
    async fn broadcast(&self, log: &AuditLog);
}
