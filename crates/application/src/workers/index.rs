use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use auditvault_core::{AppError, AppResult};

use crate::ports::{EventQueue, QueueKind, QueueMessage, QueueMessageType, SearchRepository};

use super::{MAX_MESSAGES, PollProcessor, WAIT_TIME_SECONDS, WorkerPool};

/// Pool of peers draining the index queue into the search projection.
///
/// A message is deleted only after its search write succeeds; failures loop
/// through broker redelivery. Messages that do not belong on this queue are
/// left undeleted for a classifier to dead-letter.
pub struct IndexWorker {
    pool: WorkerPool<IndexProcessor>,
}

impl IndexWorker {
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        search: Arc<dyn SearchRepository>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pool: WorkerPool::new(
                Arc::new(IndexProcessor { queue, search }),
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

struct IndexProcessor {
    queue: Arc<dyn EventQueue>,
    search: Arc<dyn SearchRepository>,
}

impl IndexProcessor {
    async fn process_message(&self, message: &QueueMessage) -> AppResult<()> {
        match message.message_type {
            QueueMessageType::Index => {
                if message.logs.len() != 1 {
                    return Err(AppError::Validation(format!(
                        "invalid number of logs for INDEX message: {}",
                        message.logs.len()
                    )));
                }
                self.search.index(&message.logs[0]).await
            }
            QueueMessageType::BulkIndex => {
                if message.logs.is_empty() {
                    return Err(AppError::Validation(
                        "empty logs array for BULK_INDEX message".to_owned(),
                    ));
                }
                self.search.bulk_index(&message.logs).await
            }
            other => Err(AppError::Validation(format!(
                "unexpected message type {other:?} on index queue"
            ))),
        }
    }
}

#[async_trait]
impl PollProcessor for IndexProcessor {
    fn queue_name(&self) -> &'static str {
        "index"
    }

    async fn process_available(&self) -> AppResult<usize> {
        let messages = self
            .queue
            .receive(QueueKind::Index, MAX_MESSAGES, WAIT_TIME_SECONDS)
            .await?;

        let mut processed = 0;
        for received in messages {
            if let Err(err) = self.process_message(&received.message).await {
                warn!(
                    tenant_id = %received.message.tenant_id,
                    error = %err,
                    "failed to process index message"
                );
                continue;
            }

            if let Err(err) = self
                .queue
                .delete(QueueKind::Index, &received.receipt_handle)
                .await
            {
                error!(error = %err, "failed to delete index message");
                continue;
            }
            processed += 1;
        }

        Ok(processed)
    }
}
