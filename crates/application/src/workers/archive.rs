use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use auditvault_core::{AppError, AppResult};

use crate::ports::{
    ArchiveStore, EventQueue, EventRepository, LogArchive, QueueKind, QueueMessage,
    QueueMessageType,
};

use super::{MAX_MESSAGES, PollProcessor, WAIT_TIME_SECONDS, WorkerPool};

/// Pool of peers executing the first half of the archive-then-delete chain.
///
/// Per message: read the window from the primary store, write the object,
/// enqueue cleanup, ack. The cleanup enqueue strictly follows a successful
/// object write, so cleanup can never run before its archive exists. Empty
/// windows skip the object write but still chain cleanup to keep the
/// contract stable. A redelivered message may overwrite an identical object
/// under the same key, which is harmless.
pub struct ArchiveWorker {
    pool: WorkerPool<ArchiveProcessor>,
}

impl ArchiveWorker {
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        events: Arc<dyn EventRepository>,
        archive: Arc<dyn ArchiveStore>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pool: WorkerPool::new(
                Arc::new(ArchiveProcessor {
                    queue,
                    events,
                    archive,
                }),
                worker_count,
                poll_interval,
            ),
        }
    }

    pub fn start(&mut self) {
        self.pool.start();
    }

    pub async fn stop(&mut self) {
        self.pool.stop().await;
    }

    /// Drains one received batch without the poll loop.
    pub async fn run_once(&self) -> AppResult<usize> {
        self.pool.processor.process_available().await
    }
}

struct ArchiveProcessor {
    queue: Arc<dyn EventQueue>,
    events: Arc<dyn EventRepository>,
    archive: Arc<dyn ArchiveStore>,
}

impl ArchiveProcessor {
    async fn process_message(&self, message: &QueueMessage) -> AppResult<()> {
        let before_date = message.before_date.ok_or_else(|| {
            AppError::Validation("ARCHIVE message is missing before_date".to_owned())
        })?;
        let tenant_id = message.tenant_id;

        let logs = self.events.list_before(tenant_id, before_date).await?;

        if logs.is_empty() {
            info!(%tenant_id, %before_date, "no logs found for archival");
        } else {
            let count = logs.len();
            let key = self
                .archive
                .store(&LogArchive::new(tenant_id, before_date, logs))
                .await?;
            info!(%tenant_id, %before_date, count, key, "archived logs");
        }

        self.queue
            .send(
                QueueKind::Cleanup,
                &QueueMessage::cleanup(tenant_id, before_date),
            )
            .await
    }
}

#[async_trait]
impl PollProcessor for ArchiveProcessor {
    fn queue_name(&self) -> &'static str {
        "archive"
    }

    async fn process_available(&self) -> AppResult<usize> {
        let messages = self
            .queue
            .receive(QueueKind::Archive, MAX_MESSAGES, WAIT_TIME_SECONDS)
            .await?;

        let mut processed = 0;
        for received in messages {
            if received.message.message_type != QueueMessageType::Archive {
                warn!(
                    message_type = ?received.message.message_type,
                    "unexpected message type on archive queue"
                );
                continue;
            }

            if let Err(err) = self.process_message(&received.message).await {
                error!(
                    tenant_id = %received.message.tenant_id,
                    error = %err,
                    "failed to process archive message"
                );
                continue;
            }

            if let Err(err) = self
                .queue
                .delete(QueueKind::Archive, &received.receipt_handle)
                .await
            {
                error!(error = %err, "failed to delete archive message");
                continue;
            }
            processed += 1;
        }

        Ok(processed)
    }
}
