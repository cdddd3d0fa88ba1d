use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter, AuditLogStats, NewAuditLog};

use crate::ports::{
    EventQueue, EventRepository, LogBroadcaster, QueueKind, QueueMessage, SearchRepository,
};


/// Ingestion and query service for audit events.
///
/// The service is the sole writer to the primary store on the create path.
/// Persistence must succeed for a call to succeed; the index enqueue and the
/// live broadcast that follow are best-effort and only logged on failure.
/// Indexing is retried through broker redelivery, and a lost broadcast is
/// backpressure.
#[derive(Clone)]
pub struct AuditLogService {
    events: Arc<dyn EventRepository>,
    search: Arc<dyn SearchRepository>,
    queue: Arc<dyn EventQueue>,
    // Late-bound: the live hub is constructed after this service exists.
    broadcaster: Arc<RwLock<Option<Arc<dyn LogBroadcaster>>>>,
}

impl AuditLogService {
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        search: Arc<dyn SearchRepository>,
        queue: Arc<dyn EventQueue>,
    ) -> Self {
        Self {
            events,
            search,
            queue,
            broadcaster: Arc::new(RwLock::new(None)),
        }
    }

    /// Wires the live fan-out hook once it exists.
    pub fn set_broadcaster(&self, broadcaster: Arc<dyn LogBroadcaster>) {
        if let Ok(mut slot) = self.broadcaster.write() {
            *slot = Some(broadcaster);
        }
    }

    /// Persists one event, enqueues it for indexing and publishes it to the
    /// tenant's live channel.
    pub async fn create(&self, input: NewAuditLog) -> AppResult<AuditLog> {
        let log = input.into_audit_log(Utc::now())?;

        self.events.create(&log).await?;

        if let Err(error) = self
            .queue
            .send(QueueKind::Index, &QueueMessage::index(log.clone()))
            .await
        {
            warn!(log_id = %log.id, tenant_id = %log.tenant_id, error = %error,
                "failed to enqueue index message; event awaits operator replay");
        }

        self.broadcast(&log).await;

        Ok(log)
    }

    /// Persists a batch for one tenant atomically, enqueues a single bulk
    /// index envelope and publishes each event.
    pub async fn bulk_create(&self, inputs: Vec<NewAuditLog>) -> AppResult<Vec<AuditLog>> {
        if inputs.is_empty() {
            return Err(AppError::Validation(
                "bulk create requires at least one event".to_owned(),
            ));
        }

        let tenant_id = inputs[0].tenant_id;
        if inputs.iter().any(|input| input.tenant_id != tenant_id) {
            return Err(AppError::Validation(
                "bulk create events must belong to one tenant".to_owned(),
            ));
        }

        let now = Utc::now();
        let logs = inputs
            .into_iter()
            .map(|input| input.into_audit_log(now))
            .collect::<AppResult<Vec<_>>>()?;

        self.events.bulk_create(&logs).await?;

        if let Err(error) = self
            .queue
            .send(QueueKind::Index, &QueueMessage::bulk_index(logs.clone()))
            .await
        {
            warn!(tenant_id = %tenant_id, count = logs.len(), error = %error,
                "failed to enqueue bulk index message; events await operator replay");
        }

        for log in &logs {
            self.broadcast(log).await;
        }

        Ok(logs)
    }

    /// Fetches one event scoped to the caller's tenant.
    pub async fn find_by_id(&self, tenant_id: TenantId, id: Uuid) -> AppResult<AuditLog> {
        self.events
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("audit log {id} not found")))
    }

    /// Lists events, routing by filter shape: content predicates go to the
    /// search index, pure time-range queries stay on the primary store.
    pub async fn list(
        &self,
        filter: &mut AuditLogFilter,
        use_pagination: bool,
    ) -> AppResult<Vec<AuditLog>> {
        if use_pagination {
            filter.normalize_pagination();
        }

        if filter.has_search_criteria() {
            return self.search.search(filter).await;
        }

        self.events.list(filter).await
    }

    /// Aggregated counters over the filter window.
    pub async fn get_stats(&self, filter: &AuditLogFilter) -> AppResult<AuditLogStats> {
        self.events.stats(filter).await
    }

    /// Enqueues the archive half of the archive-then-delete chain and
    /// returns without waiting for the workers.
    pub async fn schedule_archive(
        &self,
        tenant_id: TenantId,
        before_date: DateTime<Utc>,
    ) -> AppResult<()> {
        self.queue
            .send(
                QueueKind::Archive,
                &QueueMessage::archive(tenant_id, before_date),
            )
            .await
    }

    async fn broadcast(&self, log: &AuditLog) {
        let broadcaster = self
            .broadcaster
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().cloned());

        if let Some(broadcaster) = broadcaster {
            broadcaster.broadcast(log).await;
        }
    }
}
