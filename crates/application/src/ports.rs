mod archive;
mod broadcast;
mod events;
mod pubsub;
mod queue;
mod search;
mod tenants;

pub use archive::{ArchiveStore, LogArchive};
pub use broadcast::LogBroadcaster;
pub use events::EventRepository;
pub use pubsub::{EventPubSub, tenant_channel};
pub use queue::{EventQueue, QueueKind, QueueMessage, QueueMessageType, ReceivedMessage};
pub use search::SearchRepository;
pub use tenants::TenantRepository;
