use async_trait::async_trait;
use tokio::sync::mpsc;

use auditvault_core::{AppResult, TenantId};
use auditvault_domain::AuditLog;

/// Stable channel name for a tenant's live stream.
#[must_use]
pub fn tenant_channel(tenant_id: TenantId) -> String {
    format!("audit_logs:{tenant_id}")
}

/// Port for the pub/sub substrate bridging ingestion to live subscribers.
///
/// The substrate owns one long-lived decoder task per subscribed tenant and
/// pushes decoded events into the provided sink. Subscriptions are managed
/// by the live hub, which reference-counts them per tenant.
#[async_trait]
pub trait EventPubSub: Send + Sync {
    /// Publishes one event to its tenant channel.
    async fn publish(&self, log: &AuditLog) -> AppResult<()>;

    /// Starts forwarding the tenant channel into `sink`. Idempotent per
    /// tenant; a second subscribe while one is active is a no-op.
    async fn subscribe(&self, tenant_id: TenantId, sink: mpsc::Sender<AuditLog>) -> AppResult<()>;

    /// Stops forwarding the tenant channel.
    async fn unsubscribe(&self, tenant_id: TenantId);

    /// Tears down every subscription.
    async fn close(&self);
}
