//! Application services, capability ports and worker loops.

#![forbid(unsafe_code)]

mod audit_log_service;
mod ports;
mod rate_limit_service;
mod tenant_service;
mod workers;

pub use audit_log_service::AuditLogService;
pub use ports::{
    ArchiveStore, EventPubSub, EventQueue, EventRepository, LogArchive, LogBroadcaster,
    QueueKind, QueueMessage, QueueMessageType, ReceivedMessage, SearchRepository,
    TenantRepository, tenant_channel,
};
pub use rate_limit_service::{
    AttemptInfo, RATE_LIMIT_WINDOW_SECONDS, RateLimitDecision, RateLimitScope, RateLimitService,
    RateLimitStore,
};
pub use tenant_service::TenantService;
pub use workers::{ArchiveWorker, CleanupWorker, IndexWorker};
