use axum::Extension;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use auditvault_core::{CallerIdentity, TenantId};

use crate::hub::{CLIENT_BUFFER, ClientSession, LiveHub};
use crate::state::AppState;

/// Upgrades to a WebSocket carrying the caller tenant's live event stream.
pub async fn stream_logs_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Response {
    let tenant_id = caller.tenant_id();
    ws.on_upgrade(move |socket| handle_socket(socket, tenant_id, state.live_hub.clone()))
}

async fn handle_socket(socket: WebSocket, tenant_id: TenantId, hub: std::sync::Arc<LiveHub>) {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let (buffer_tx, mut buffer_rx) = mpsc::channel::<String>(CLIENT_BUFFER);
    let client_id = Uuid::new_v4();

    hub.register(ClientSession {
        id: client_id,
        tenant_id,
        sender: buffer_tx,
    })
    .await;

    // Writer task: drain the bounded buffer to the wire.
    let mut write_task = tokio::spawn(async move {
        while let Some(payload) = buffer_rx.recv().await {
            if socket_tx.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = socket_tx.send(Message::Close(None)).await;
    });

    // Reader task: clients send nothing meaningful; this exists to observe
    // disconnect.
    let mut read_task = tokio::spawn(async move {
        while let Some(message) = socket_rx.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(other) => {
                    debug!(%tenant_id, "ignoring client message: {other:?}");
                }
            }
        }
    });

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    hub.unregister(client_id).await;
}
