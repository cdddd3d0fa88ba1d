use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use auditvault_core::{AppResult, TenantId};
use auditvault_domain::AuditLog;

/// The three independent persistent queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Index,
    Archive,
    Cleanup,
}

/// Broker envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueMessageType {
    Index,
    BulkIndex,
    Archive,
    Cleanup,
}

/// Broker envelope, serialized as JSON on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(rename = "type")]
    pub message_type: QueueMessageType,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<AuditLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_date: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl QueueMessage {
    #[must_use]
    pub fn index(log: AuditLog) -> Self {
        Self {
            message_type: QueueMessageType::Index,
            tenant_id: log.tenant_id,
            timestamp: log.timestamp,
            logs: vec![log],
            before_date: None,
        }
    }

    /// A bulk envelope; all logs belong to one tenant.
    #[must_use]
    pub fn bulk_index(logs: Vec<AuditLog>) -> Self {
        let tenant_id = logs.first().map(|log| log.tenant_id).unwrap_or_default();
        let timestamp = logs.first().map(|log| log.timestamp).unwrap_or_else(Utc::now);
        Self {
            message_type: QueueMessageType::BulkIndex,
            tenant_id,
            timestamp,
            logs,
            before_date: None,
        }
    }

    #[must_use]
    pub fn archive(tenant_id: TenantId, before_date: DateTime<Utc>) -> Self {
        Self {
            message_type: QueueMessageType::Archive,
            tenant_id,
            logs: Vec::new(),
            before_date: Some(before_date),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn cleanup(tenant_id: TenantId, before_date: DateTime<Utc>) -> Self {
        Self {
            message_type: QueueMessageType::Cleanup,
            tenant_id,
            logs: Vec::new(),
            before_date: Some(before_date),
            timestamp: Utc::now(),
        }
    }
}

/// A message pulled from a queue, deletable by receipt handle.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: QueueMessage,
    pub receipt_handle: String,
}

/// Port for the at-least-once broker. Consumers must tolerate duplicates;
/// a message not deleted before its visibility timeout is redelivered.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn send(&self, kind: QueueKind, message: &QueueMessage) -> AppResult<()>;

    /// Long-polls one queue for up to `wait_seconds`, returning at most
    /// `max_messages` envelopes.
    async fn receive(
        &self,
        kind: QueueKind,
        max_messages: i32,
        wait_seconds: i32,
    ) -> AppResult<Vec<ReceivedMessage>>;

    async fn delete(&self, kind: QueueKind, receipt_handle: &str) -> AppResult<()>;
}
