use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use auditvault_core::AppResult;

mod archive;
mod cleanup;
mod index;
#[cfg(test)]
mod tests;

pub use archive::ArchiveWorker;
pub use cleanup::CleanupWorker;
pub use index::IndexWorker;

/// Long-poll batch size shared by all worker families.
const MAX_MESSAGES: i32 = 10;
/// Long-poll wait shared by all worker families.
const WAIT_TIME_SECONDS: i32 = 20;

/// One poll-loop body: receive a batch, process it, delete what succeeded.
#[async_trait]
trait PollProcessor: Send + Sync + 'static {
    fn queue_name(&self) -> &'static str;

    /// Processes at most one received batch; returns how many messages were
    /// handled and acknowledged.
    async fn process_available(&self) -> AppResult<usize>;
}

/// Pool of `worker_count` peers sharing one shutdown signal.
///
/// Stop closes the signal and joins every peer; acks in flight complete
/// before the join returns.
struct WorkerPool<P> {
    processor: Arc<P>,
    worker_count: usize,
    poll_interval: Duration,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<P: PollProcessor> WorkerPool<P> {
    fn new(processor: Arc<P>, worker_count: usize, poll_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            processor,
            worker_count: worker_count.max(1),
            poll_interval,
            shutdown,
            handles: Vec::new(),
        }
    }

    fn start(&mut self) {
        info!(
            queue = self.processor.queue_name(),
            worker_count = self.worker_count,
            "starting workers"
        );

        for worker_id in 0..self.worker_count {
            let processor = self.processor.clone();
            let poll_interval = self.poll_interval;
            let mut shutdown = self.shutdown.subscribe();

            self.handles.push(tokio::spawn(async move {
                info!(queue = processor.queue_name(), worker_id, "worker started");

                let mut ticker = tokio::time::interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            info!(queue = processor.queue_name(), worker_id, "worker shutting down");
                            break;
                        }
                        _ = ticker.tick() => {
                            if let Err(err) = processor.process_available().await {
                                error!(
                                    queue = processor.queue_name(),
                                    worker_id,
                                    error = %err,
                                    "failed to process messages"
                                );
                            }
                        }
                    }
                }
            }));
        }
    }

    async fn stop(&mut self) {
        info!(queue = self.processor.queue_name(), "stopping workers");
        let _ = self.shutdown.send(true);

        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!(queue = self.processor.queue_name(), "all workers stopped");
    }
}
