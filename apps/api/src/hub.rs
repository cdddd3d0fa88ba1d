use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use auditvault_application::{EventPubSub, LogBroadcaster};
use auditvault_core::TenantId;
use auditvault_domain::AuditLog;

/// Bound of each client's outbound buffer. A client that falls this far
/// behind is dropped.
pub const CLIENT_BUFFER: usize = 256;

/// One connected live-stream client.
pub struct ClientSession {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// Serialized event payloads, drained to the wire by the writer task.
    pub sender: mpsc::Sender<String>,
}

/// Live fan-out hub.
///
/// A single actor owns the client set and the per-tenant subscription
/// refcounts; register, unregister and pub/sub deliveries arrive as
/// messages on its channels. The first client of a tenant subscribes the
/// tenant channel on the substrate, the last one leaving unsubscribes it.
/// The hub never retains events.
pub struct LiveHub {
    register_tx: mpsc::Sender<ClientSession>,
    unregister_tx: mpsc::Sender<Uuid>,
    pubsub: Arc<dyn EventPubSub>,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl LiveHub {
    /// Spawns the hub actor.
    pub fn start(pubsub: Arc<dyn EventPubSub>) -> Arc<Self> {
        let (register_tx, register_rx) = mpsc::channel(64);
        let (unregister_tx, unregister_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(1024);

        let actor = HubActor {
            pubsub: pubsub.clone(),
            events_tx,
            clients: HashMap::new(),
            tenant_clients: HashMap::new(),
        };
        let handle = tokio::spawn(actor.run(register_rx, unregister_rx, events_rx));

        Arc::new(Self {
            register_tx,
            unregister_tx,
            pubsub,
            actor: Mutex::new(Some(handle)),
        })
    }

    pub async fn register(&self, session: ClientSession) {
        if self.register_tx.send(session).await.is_err() {
            warn!("live hub is down; dropping client registration");
        }
    }

    pub async fn unregister(&self, client_id: Uuid) {
        let _ = self.unregister_tx.send(client_id).await;
    }

    /// Tears down every subscription and stops the actor.
    pub async fn shutdown(&self) {
        self.pubsub.close().await;
        if let Some(handle) = self.actor.lock().await.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LogBroadcaster for LiveHub {
    async fn broadcast(&self, log: &AuditLog) {
        // Publishing through the substrate reaches every process's hub,
        // including this one. Best-effort by contract.
        if let Err(error) = self.pubsub.publish(log).await {
            warn!(tenant_id = %log.tenant_id, error = %error, "failed to publish live event");
        }
    }
}

struct HubActor {
    pubsub: Arc<dyn EventPubSub>,
    events_tx: mpsc::Sender<AuditLog>,
    clients: HashMap<Uuid, ClientSession>,
    tenant_clients: HashMap<TenantId, usize>,
}

impl HubActor {
    async fn run(
        mut self,
        mut register_rx: mpsc::Receiver<ClientSession>,
        mut unregister_rx: mpsc::Receiver<Uuid>,
        mut events_rx: mpsc::Receiver<AuditLog>,
    ) {
        loop {
            tokio::select! {
                session = register_rx.recv() => match session {
                    Some(session) => self.on_register(session).await,
                    None => break,
                },
                client_id = unregister_rx.recv() => match client_id {
                    Some(client_id) => self.on_unregister(client_id).await,
                    None => break,
                },
                log = events_rx.recv() => match log {
                    Some(log) => self.on_event(log).await,
                    None => break,
                },
            }
        }
    }

    async fn on_register(&mut self, session: ClientSession) {
        let tenant_id = session.tenant_id;
        let count = self.tenant_clients.entry(tenant_id).or_insert(0);
        *count += 1;

        if *count == 1 {
            if let Err(error) = self
                .pubsub
                .subscribe(tenant_id, self.events_tx.clone())
                .await
            {
                warn!(%tenant_id, error = %error, "failed to subscribe to tenant channel");
            }
        }

        info!(%tenant_id, client_id = %session.id, "live client registered");
        self.clients.insert(session.id, session);
    }

    async fn on_unregister(&mut self, client_id: Uuid) {
        let Some(session) = self.clients.remove(&client_id) else {
            return;
        };
        self.release_tenant(session.tenant_id).await;
        info!(tenant_id = %session.tenant_id, %client_id, "live client unregistered");
    }

    async fn release_tenant(&mut self, tenant_id: TenantId) {
        if let Some(count) = self.tenant_clients.get_mut(&tenant_id) {
            *count -= 1;
            if *count == 0 {
                self.tenant_clients.remove(&tenant_id);
                self.pubsub.unsubscribe(tenant_id).await;
            }
        }
    }

    async fn on_event(&mut self, log: AuditLog) {
        let payload = match serde_json::to_string(&log) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(error = %error, "failed to serialize live event");
                return;
            }
        };

        let mut dropped = Vec::new();
        for session in self.clients.values() {
            if session.tenant_id != log.tenant_id {
                continue;
            }
            // A full buffer means the client cannot keep up; drop it.
            if session.sender.try_send(payload.clone()).is_err() {
                dropped.push(session.id);
            }
        }

        for client_id in dropped {
            if let Some(session) = self.clients.remove(&client_id) {
                warn!(
                    tenant_id = %session.tenant_id,
                    %client_id,
                    "dropping slow live client"
                );
                self.release_tenant(session.tenant_id).await;
            }
        }
    }
}
