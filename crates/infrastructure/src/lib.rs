//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod opensearch_search_repository;
mod postgres_audit_log_repository;
mod postgres_tenant_repository;
mod redis_event_pubsub;
mod redis_rate_limit_repository;
mod s3_archive_store;
mod sqs_event_queue;

pub use opensearch_search_repository::{OpenSearchSearchRepository, OpenSearchTarget};
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_tenant_repository::PostgresTenantRepository;
pub use redis_event_pubsub::RedisEventPubSub;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
pub use s3_archive_store::{S3ArchiveConfig, S3ArchiveStore};
pub use sqs_event_queue::{SqsEventQueue, SqsQueueConfig};
