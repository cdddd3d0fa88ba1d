use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use auditvault_core::{AppError, AppResult};

use crate::ports::{EventQueue, EventRepository, QueueKind, QueueMessage, QueueMessageType};

use super::{MAX_MESSAGES, PollProcessor, WAIT_TIME_SECONDS, WorkerPool};

/// Pool of peers executing the delete half of the archive-then-delete chain.
///
/// Every message on this queue sits downstream of a successful archive, so
/// a crash between archive and cleanup cannot lose data. Duplicate cleanup
/// deliveries delete zero rows.
pub struct CleanupWorker {
    pool: WorkerPool<CleanupProcessor>,
}

impl CleanupWorker {
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        events: Arc<dyn EventRepository>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pool: WorkerPool::new(
                Arc::new(CleanupProcessor { queue, events }),
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

struct CleanupProcessor {
    queue: Arc<dyn EventQueue>,
    events: Arc<dyn EventRepository>,
}

impl CleanupProcessor {
    async fn process_message(&self, message: &QueueMessage) -> AppResult<()> {
        let before_date = message.before_date.ok_or_else(|| {
            AppError::Validation("CLEANUP message is missing before_date".to_owned())
        })?;

        let deleted = self
            .events
            .delete_before(message.tenant_id, before_date)
            .await?;

        info!(
            tenant_id = %message.tenant_id,
            %before_date,
            deleted,
            "deleted archived logs"
        );

        Ok(())
    }
}

#[async_trait]
impl PollProcessor for CleanupProcessor {
    fn queue_name(&self) -> &'static str {
        "cleanup"
    }

    async fn process_available(&self) -> AppResult<usize> {
        let messages = self
            .queue
            .receive(QueueKind::Cleanup, MAX_MESSAGES, WAIT_TIME_SECONDS)
            .await?;

        let mut processed = 0;
        for received in messages {
            if received.message.message_type != QueueMessageType::Cleanup {
                warn!(
                    message_type = ?received.message.message_type,
                    "unexpected message type on cleanup queue"
                );
                continue;
            }

            if let Err(err) = self.process_message(&received.message).await {
                error!(
                    tenant_id = %received.message.tenant_id,
                    error = %err,
                    "failed to process cleanup message"
                );
                continue;
            }

            if let Err(err) = self
                .queue
                .delete(QueueKind::Cleanup, &received.receipt_handle)
                .await
            {
                error!(error = %err, "failed to delete cleanup message");
                continue;
            }
            processed += 1;
        }

        Ok(processed)
    }
}
