use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use tracing::warn;

use auditvault_application::{EventQueue, QueueKind, QueueMessage, ReceivedMessage};
use auditvault_core::{AppError, AppResult};

/// Connection coordinates and queue URLs for the broker.
#[derive(Debug, Clone)]
pub struct SqsQueueConfig {
    pub region: String,
    /// Custom endpoint for LocalStack-style deployments.
    pub endpoint: Option<String>,
    pub index_queue_url: String,
    pub archive_queue_url: String,
    pub cleanup_queue_url: String,
}

/// SQS-backed broker adapter over the three lifecycle queues.
#[derive(Clone)]
pub struct SqsEventQueue {
    client: aws_sdk_sqs::Client,
    index_queue_url: String,
    archive_queue_url: String,
    cleanup_queue_url: String,
}

impl SqsEventQueue {
    /// Builds the SQS client, honoring a custom endpoint when configured.
    pub async fn connect(config: SqsQueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        Self {
            client: aws_sdk_sqs::Client::new(&shared),
            index_queue_url: config.index_queue_url,
            archive_queue_url: config.archive_queue_url,
            cleanup_queue_url: config.cleanup_queue_url,
        }
    }

    fn queue_url(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Index => self.index_queue_url.as_str(),
            QueueKind::Archive => self.archive_queue_url.as_str(),
            QueueKind::Cleanup => self.cleanup_queue_url.as_str(),
        }
    }
}

#[async_trait]
impl EventQueue for SqsEventQueue {
    async fn send(&self, kind: QueueKind, message: &QueueMessage) -> AppResult<()> {
        let body = serde_json::to_string(message).map_err(|error| {
            AppError::Internal(format!("failed to serialize queue message: {error}"))
        })?;

        self.client
            .send_message()
            .queue_url(self.queue_url(kind))
            .message_body(body)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to send queue message: {error}"))
            })?;

        Ok(())
    }

    async fn receive(
        &self,
        kind: QueueKind,
        max_messages: i32,
        wait_seconds: i32,
    ) -> AppResult<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(self.queue_url(kind))
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to receive queue messages: {error}"))
            })?;

        let mut received = Vec::new();
        for message in output.messages() {
            let (Some(body), Some(receipt_handle)) = (message.body(), message.receipt_handle())
            else {
                continue;
            };

            match serde_json::from_str::<QueueMessage>(body) {
                Ok(parsed) => received.push(ReceivedMessage {
                    message: parsed,
                    receipt_handle: receipt_handle.to_owned(),
                }),
                Err(error) => {
                    // Left undeleted; the broker's retention ages it out.
                    warn!(error = %error, "dropping malformed queue message body");
                }
            }
        }

        Ok(received)
    }

    async fn delete(&self, kind: QueueKind, receipt_handle: &str) -> AppResult<()> {
        self.client
            .delete_message()
            .queue_url(self.queue_url(kind))
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to delete queue message: {error}"))
            })?;

        Ok(())
    }
}
