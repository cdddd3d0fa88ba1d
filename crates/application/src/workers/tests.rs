use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter, AuditLogStats, NewAuditLog, Severity};

use crate::ports::{
    ArchiveStore, EventQueue, EventRepository, LogArchive, QueueKind, QueueMessage,
    QueueMessageType, ReceivedMessage, SearchRepository,
};

use super::{ArchiveWorker, CleanupWorker, IndexWorker};

const POLL: Duration = Duration::from_millis(10);

/// At-least-once queue triple: messages stay visible until deleted.
#[derive(Default)]
struct InMemoryQueue {
    queues: Mutex<[Vec<(String, QueueMessage)>; 3]>,
}

fn slot(kind: QueueKind) -> usize {
    match kind {
        QueueKind::Index => 0,
        QueueKind::Archive => 1,
        QueueKind::Cleanup => 2,
    }
}

impl InMemoryQueue {
    async fn len(&self, kind: QueueKind) -> usize {
        self.queues.lock().await[slot(kind)].len()
    }

    async fn messages(&self, kind: QueueKind) -> Vec<QueueMessage> {
        self.queues.lock().await[slot(kind)]
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl EventQueue for InMemoryQueue {
    async fn send(&self, kind: QueueKind, message: &QueueMessage) -> AppResult<()> {
        self.queues.lock().await[slot(kind)].push((Uuid::new_v4().to_string(), message.clone()));
        Ok(())
    }

    async fn receive(
        &self,
        kind: QueueKind,
        max_messages: i32,
        _wait_seconds: i32,
    ) -> AppResult<Vec<ReceivedMessage>> {
        Ok(self.queues.lock().await[slot(kind)]
            .iter()
            .take(max_messages as usize)
            .map(|(handle, message)| ReceivedMessage {
                message: message.clone(),
                receipt_handle: handle.clone(),
            })
            .collect())
    }

    async fn delete(&self, kind: QueueKind, receipt_handle: &str) -> AppResult<()> {
        self.queues.lock().await[slot(kind)].retain(|(handle, _)| handle != receipt_handle);
        Ok(())
    }
}

#[derive(Default)]
struct FakeEvents {
    logs: Mutex<Vec<AuditLog>>,
}

#[async_trait]
impl EventRepository for FakeEvents {
    async fn create(&self, log: &AuditLog) -> AppResult<()> {
        self.logs.lock().await.push(log.clone());
        Ok(())
    }

    async fn bulk_create(&self, logs: &[AuditLog]) -> AppResult<()> {
        self.logs.lock().await.extend_from_slice(logs);
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: Uuid) -> AppResult<Option<AuditLog>> {
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .find(|log| log.tenant_id == tenant_id && log.id == id)
            .cloned())
    }

    async fn list(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .filter(|log| log.tenant_id == filter.tenant_id)
            .cloned()
            .collect())
    }

    async fn stats(&self, _filter: &AuditLogFilter) -> AppResult<AuditLogStats> {
        Ok(AuditLogStats::default())
    }

    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLog>> {
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .filter(|log| log.tenant_id == tenant_id && log.timestamp < before)
            .cloned()
            .collect())
    }

    async fn delete_before(&self, tenant_id: TenantId, before: DateTime<Utc>) -> AppResult<u64> {
        let mut logs = self.logs.lock().await;
        let initial = logs.len();
        logs.retain(|log| !(log.tenant_id == tenant_id && log.timestamp < before));
        Ok((initial - logs.len()) as u64)
    }
}

/// Document-id keyed, mirroring the search engine's overwrite-on-same-id
/// behavior that makes re-indexing idempotent.
#[derive(Default)]
struct FakeSearch {
    documents: Mutex<HashMap<Uuid, AuditLog>>,
    fail: bool,
}

#[async_trait]
impl SearchRepository for FakeSearch {
    async fn index(&self, log: &AuditLog) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Unavailable("search index down".to_owned()));
        }
        self.documents.lock().await.insert(log.id, log.clone());
        Ok(())
    }

    async fn bulk_index(&self, logs: &[AuditLog]) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Unavailable("search index down".to_owned()));
        }
        let mut documents = self.documents.lock().await;
        for log in logs {
            documents.insert(log.id, log.clone());
        }
        Ok(())
    }

    async fn search(&self, _filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeArchive {
    archives: Mutex<Vec<LogArchive>>,
    fail: bool,
}

#[async_trait]
impl ArchiveStore for FakeArchive {
    async fn store(&self, archive: &LogArchive) -> AppResult<String> {
        if self.fail {
            return Err(AppError::Unavailable("object store down".to_owned()));
        }
        let key = format!(
            "audit-logs/{}/audit_logs_{}_before_{}.json",
            archive.tenant_id,
            archive.tenant_id,
            archive.before_date.format("%Y-%m-%d_%H-%M-%S")
        );
        self.archives.lock().await.push(archive.clone());
        Ok(key)
    }
}

fn sample_log(tenant_id: TenantId, timestamp: DateTime<Utc>) -> AuditLog {
    NewAuditLog {
        id: None,
        tenant_id,
        user_id: Some("user-1".to_owned()),
        session_id: None,
        ip_address: None,
        user_agent: None,
        action: "CREATE".to_owned(),
        resource_type: Some("user".to_owned()),
        resource_id: Some("u1".to_owned()),
        message: Some("hi".to_owned()),
        severity: Severity::Info,
        before_state: None,
        after_state: None,
        metadata: None,
        timestamp,
    }
    .into_audit_log(timestamp)
    .expect("valid log")
}

#[tokio::test]
async fn index_worker_indexes_and_acks_single_messages() {
    let queue = Arc::new(InMemoryQueue::default());
    let search = Arc::new(FakeSearch::default());
    let worker = IndexWorker::new(queue.clone(), search.clone(), 1, POLL);

    let log = sample_log(TenantId::new(), Utc::now());
    queue
        .send(QueueKind::Index, &QueueMessage::index(log.clone()))
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");

    assert_eq!(processed, 1);
    assert_eq!(queue.len(QueueKind::Index).await, 0);
    assert!(search.documents.lock().await.contains_key(&log.id));
}

#[tokio::test]
async fn index_worker_handles_bulk_envelopes() {
    let queue = Arc::new(InMemoryQueue::default());
    let search = Arc::new(FakeSearch::default());
    let worker = IndexWorker::new(queue.clone(), search.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let logs: Vec<AuditLog> = (0..4).map(|_| sample_log(tenant_id, Utc::now())).collect();
    queue
        .send(QueueKind::Index, &QueueMessage::bulk_index(logs))
        .await
        .expect("seeded");

    worker.run_once().await.expect("poll succeeds");

    assert_eq!(search.documents.lock().await.len(), 4);
    assert_eq!(queue.len(QueueKind::Index).await, 0);
}

#[tokio::test]
async fn duplicate_bulk_envelopes_yield_the_same_document_set() {
    let queue = Arc::new(InMemoryQueue::default());
    let search = Arc::new(FakeSearch::default());
    let worker = IndexWorker::new(queue.clone(), search.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let logs: Vec<AuditLog> = (0..3).map(|_| sample_log(tenant_id, Utc::now())).collect();
    let envelope = QueueMessage::bulk_index(logs);

    // Redelivery of the same envelope.
    queue.send(QueueKind::Index, &envelope).await.expect("seeded");
    queue.send(QueueKind::Index, &envelope).await.expect("seeded");

    worker.run_once().await.expect("poll succeeds");

    assert_eq!(search.documents.lock().await.len(), 3);
}

#[tokio::test]
async fn index_worker_leaves_failed_messages_for_redelivery() {
    let queue = Arc::new(InMemoryQueue::default());
    let search = Arc::new(FakeSearch {
        fail: true,
        ..FakeSearch::default()
    });
    let worker = IndexWorker::new(queue.clone(), search, 1, POLL);

    queue
        .send(
            QueueKind::Index,
            &QueueMessage::index(sample_log(TenantId::new(), Utc::now())),
        )
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll itself succeeds");

    assert_eq!(processed, 0);
    assert_eq!(queue.len(QueueKind::Index).await, 1);
}

#[tokio::test]
async fn index_worker_leaves_foreign_message_types_undeleted() {
    let queue = Arc::new(InMemoryQueue::default());
    let worker = IndexWorker::new(queue.clone(), Arc::new(FakeSearch::default()), 1, POLL);

    queue
        .send(
            QueueKind::Index,
            &QueueMessage::archive(TenantId::new(), Utc::now()),
        )
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");

    assert_eq!(processed, 0);
    assert_eq!(queue.len(QueueKind::Index).await, 1);
}

#[tokio::test]
async fn archive_worker_archives_then_chains_cleanup() {
    let queue = Arc::new(InMemoryQueue::default());
    let events = Arc::new(FakeEvents::default());
    let archive = Arc::new(FakeArchive::default());
    let worker = ArchiveWorker::new(queue.clone(), events.clone(), archive.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let before = Utc::now();
    for hours in 1..=3 {
        events
            .create(&sample_log(tenant_id, before - chrono::Duration::hours(hours)))
            .await
            .expect("seeded");
    }

    queue
        .send(QueueKind::Archive, &QueueMessage::archive(tenant_id, before))
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");
    assert_eq!(processed, 1);

    let archives = archive.archives.lock().await;
    assert_eq!(archives.len(), 1);
    assert_eq!(archives[0].log_count, 3);
    assert_eq!(archives[0].tenant_id, tenant_id);

    let chained = queue.messages(QueueKind::Cleanup).await;
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].message_type, QueueMessageType::Cleanup);
    assert_eq!(chained[0].tenant_id, tenant_id);
    assert_eq!(chained[0].before_date, Some(before));

    assert_eq!(queue.len(QueueKind::Archive).await, 0);
}

#[tokio::test]
async fn archive_worker_chains_cleanup_for_empty_windows() {
    let queue = Arc::new(InMemoryQueue::default());
    let archive = Arc::new(FakeArchive::default());
    let worker = ArchiveWorker::new(
        queue.clone(),
        Arc::new(FakeEvents::default()),
        archive.clone(),
        1,
        POLL,
    );

    queue
        .send(
            QueueKind::Archive,
            &QueueMessage::archive(TenantId::new(), Utc::now()),
        )
        .await
        .expect("seeded");

    worker.run_once().await.expect("poll succeeds");

    assert!(archive.archives.lock().await.is_empty());
    assert_eq!(queue.len(QueueKind::Cleanup).await, 1);
    assert_eq!(queue.len(QueueKind::Archive).await, 0);
}

#[tokio::test]
async fn archive_worker_object_failure_blocks_cleanup() {
    let queue = Arc::new(InMemoryQueue::default());
    let events = Arc::new(FakeEvents::default());
    let worker = ArchiveWorker::new(
        queue.clone(),
        events.clone(),
        Arc::new(FakeArchive {
            fail: true,
            ..FakeArchive::default()
        }),
        1,
        POLL,
    );

    let tenant_id = TenantId::new();
    let before = Utc::now();
    events
        .create(&sample_log(tenant_id, before - chrono::Duration::hours(1)))
        .await
        .expect("seeded");
    queue
        .send(QueueKind::Archive, &QueueMessage::archive(tenant_id, before))
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");

    assert_eq!(processed, 0);
    assert_eq!(queue.len(QueueKind::Cleanup).await, 0);
    // The archive message stays visible for redelivery.
    assert_eq!(queue.len(QueueKind::Archive).await, 1);
}

#[tokio::test]
async fn archive_worker_skips_foreign_message_types() {
    let queue = Arc::new(InMemoryQueue::default());
    let worker = ArchiveWorker::new(
        queue.clone(),
        Arc::new(FakeEvents::default()),
        Arc::new(FakeArchive::default()),
        1,
        POLL,
    );

    queue
        .send(
            QueueKind::Archive,
            &QueueMessage::cleanup(TenantId::new(), Utc::now()),
        )
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");

    assert_eq!(processed, 0);
    assert_eq!(queue.len(QueueKind::Archive).await, 1);
}

#[tokio::test]
async fn cleanup_worker_deletes_strictly_before_the_cutoff() {
    let queue = Arc::new(InMemoryQueue::default());
    let events = Arc::new(FakeEvents::default());
    let worker = CleanupWorker::new(queue.clone(), events.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let before = Utc::now();
    events
        .create(&sample_log(tenant_id, before - chrono::Duration::seconds(1)))
        .await
        .expect("seeded");
    events
        .create(&sample_log(tenant_id, before))
        .await
        .expect("seeded");
    events
        .create(&sample_log(tenant_id, before + chrono::Duration::seconds(1)))
        .await
        .expect("seeded");

    queue
        .send(QueueKind::Cleanup, &QueueMessage::cleanup(tenant_id, before))
        .await
        .expect("seeded");

    let processed = worker.run_once().await.expect("poll succeeds");
    assert_eq!(processed, 1);

    let remaining = events.logs.lock().await;
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|log| log.timestamp >= before));
    assert_eq!(queue.len(QueueKind::Cleanup).await, 0);
}

#[tokio::test]
async fn duplicate_cleanup_messages_are_noops() {
    let queue = Arc::new(InMemoryQueue::default());
    let events = Arc::new(FakeEvents::default());
    let worker = CleanupWorker::new(queue.clone(), events.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let before = Utc::now();
    events
        .create(&sample_log(tenant_id, before - chrono::Duration::hours(1)))
        .await
        .expect("seeded");

    let message = QueueMessage::cleanup(tenant_id, before);
    queue.send(QueueKind::Cleanup, &message).await.expect("seeded");
    worker.run_once().await.expect("first delivery");

    queue.send(QueueKind::Cleanup, &message).await.expect("redelivered");
    let processed = worker.run_once().await.expect("second delivery");

    // The duplicate is still acknowledged; it just deletes nothing.
    assert_eq!(processed, 1);
    assert!(events.logs.lock().await.is_empty());
    assert_eq!(queue.len(QueueKind::Cleanup).await, 0);
}

#[tokio::test]
async fn archive_before_delete_holds_across_the_chain() {
    let queue = Arc::new(InMemoryQueue::default());
    let events = Arc::new(FakeEvents::default());
    let archive = Arc::new(FakeArchive::default());
    let archive_worker =
        ArchiveWorker::new(queue.clone(), events.clone(), archive.clone(), 1, POLL);
    let cleanup_worker = CleanupWorker::new(queue.clone(), events.clone(), 1, POLL);

    let tenant_id = TenantId::new();
    let before = Utc::now();
    let seeded: Vec<Uuid> = {
        let mut ids = Vec::new();
        for hours in 1..=3 {
            let log = sample_log(tenant_id, before - chrono::Duration::hours(hours));
            ids.push(log.id);
            events.create(&log).await.expect("seeded");
        }
        ids
    };

    queue
        .send(QueueKind::Archive, &QueueMessage::archive(tenant_id, before))
        .await
        .expect("scheduled");

    archive_worker.run_once().await.expect("archive pass");
    cleanup_worker.run_once().await.expect("cleanup pass");

    assert!(events.logs.lock().await.is_empty());

    let archives = archive.archives.lock().await;
    assert_eq!(archives.len(), 1);
    let archived_ids: Vec<Uuid> = archives[0].logs.iter().map(|log| log.id).collect();
    for id in seeded {
        assert!(archived_ids.contains(&id));
    }
}

#[tokio::test(start_paused = true)]
async fn pool_start_and_stop_drain_the_queue() {
    let queue = Arc::new(InMemoryQueue::default());
    let search = Arc::new(FakeSearch::default());
    let mut worker = IndexWorker::new(queue.clone(), search.clone(), 2, POLL);

    queue
        .send(
            QueueKind::Index,
            &QueueMessage::index(sample_log(TenantId::new(), Utc::now())),
        )
        .await
        .expect("seeded");

    worker.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.stop().await;

    assert_eq!(search.documents.lock().await.len(), 1);
    assert_eq!(queue.len(QueueKind::Index).await, 0);
}
