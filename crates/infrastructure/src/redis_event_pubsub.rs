use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use auditvault_application::{EventPubSub, tenant_channel};
use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::AuditLog;

/// Redis pub/sub bridge between the ingestion path and the live hub.
///
/// One decoder task per subscribed tenant pulls messages off the tenant
/// channel and forwards them into the hub's sink. The task ends when the
/// sink closes or the subscription is torn down.
pub struct RedisEventPubSub {
    client: redis::Client,
    subscriptions: Mutex<HashMap<TenantId, JoinHandle<()>>>,
}

impl RedisEventPubSub {
    /// Builds the bridge from a Redis connection URL.
    pub fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|error| AppError::Validation(format!("invalid redis url: {error}")))?;
        Ok(Self {
            client,
            subscriptions: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl EventPubSub for RedisEventPubSub {
    async fn publish(&self, log: &AuditLog) -> AppResult<()> {
        let payload = serde_json::to_string(log).map_err(|error| {
            AppError::Internal(format!("failed to serialize audit log: {error}"))
        })?;
        let channel = tenant_channel(log.tenant_id);

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to connect to redis: {error}"))
            })?;

        redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(payload)
            .query_async::<()>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to publish to channel {channel}: {error}"))
            })?;

        Ok(())
    }

    async fn subscribe(&self, tenant_id: TenantId, sink: mpsc::Sender<AuditLog>) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(&tenant_id) {
            return Ok(());
        }

        let channel = tenant_channel(tenant_id);
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            AppError::Unavailable(format!("failed to open redis pubsub: {error}"))
        })?;
        pubsub.subscribe(&channel).await.map_err(|error| {
            AppError::Unavailable(format!("failed to subscribe to channel {channel}: {error}"))
        })?;

        let handle = tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(message) = stream.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(channel = %channel, error = %error, "unreadable pubsub payload");
                        continue;
                    }
                };

                let log: AuditLog = match serde_json::from_str(&payload) {
                    Ok(log) => log,
                    Err(error) => {
                        warn!(channel = %channel, error = %error, "undecodable pubsub payload");
                        continue;
                    }
                };

                if sink.send(log).await.is_err() {
                    // Hub gone; stop forwarding.
                    break;
                }
            }
            info!(channel = %channel, "pubsub forwarding ended");
        });

        subscriptions.insert(tenant_id, handle);
        info!(%tenant_id, "subscribed to tenant channel");
        Ok(())
    }

    async fn unsubscribe(&self, tenant_id: TenantId) {
        if let Some(handle) = self.subscriptions.lock().await.remove(&tenant_id) {
            handle.abort();
            info!(%tenant_id, "unsubscribed from tenant channel");
        }
    }

    async fn close(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for (tenant_id, handle) in subscriptions.drain() {
            handle.abort();
            info!(%tenant_id, "closed tenant channel subscription");
        }
    }
}
