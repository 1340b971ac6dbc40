//! Websocket push gateway.
//!
//! Each observer first receives the current connection status, then every
//! push event from the bridge as a JSON text frame. Observers never send
//! anything meaningful; incoming frames are only watched for close.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use meshdash_bridge::BridgeHandle;
use meshdash_shared::protocol::PushEvent;

use crate::api::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.bridge))
}

async fn handle_socket(socket: WebSocket, bridge: BridgeHandle) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the status so no transition slips between
    let mut events = bridge.subscribe();
    if send_event(&mut sender, &greeting(&bridge)).await.is_err() {
        return;
    }
    info!(observers = bridge.observer_count(), "Observer connected");

    loop {
        tokio::select! {
            result = events.recv() => match result {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Observer lagged, push events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Observer disconnected");
}

fn greeting(bridge: &BridgeHandle) -> PushEvent {
    PushEvent::ConnectionStatus {
        status: bridge.connection_status(),
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &PushEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await
}
