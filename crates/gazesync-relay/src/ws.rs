//! WebSocket connection handling: register, relay, announce count
//!
//! Frames are relayed verbatim; the relay validates the envelope type but
//! never rewrites payloads, so subject and observer agree on what was
//! said without the relay in the middle of the semantics.

use crate::server::{ClientInfo, RelayState};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use gazesync_core::{Envelope, Inbound};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn handle_connection(socket: WebSocket, addr: SocketAddr, state: Arc<RelayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before registering so this client sees its own join count.
    let mut relay_rx = state.broadcast_tx.subscribe();

    let client_id = Uuid::new_v4();
    state.clients.insert(
        client_id,
        ClientInfo {
            addr,
            connected_at: chrono::Utc::now(),
        },
    );
    info!(client = %client_id, %addr, count = state.client_count(), "client connected");
    announce_count(&state);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reply) = relay_text(&text, &state) {
                            if let Ok(json) = reply.encode() {
                                if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!(client = %client_id, "client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(client = %client_id, error = %e, "websocket error");
                        break;
                    }
                    None => break, // Stream ended
                    _ => {} // Binary, Ping, Pong — axum answers pings itself
                }
            }

            relayed = relay_rx.recv() => {
                match relayed {
                    Ok(text) => {
                        if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                            break; // Client gone
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(client = %client_id, dropped = n, "client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.clients.remove(&client_id);
    info!(client = %client_id, count = state.client_count(), "client removed");
    announce_count(&state);
}

/// Relay one inbound frame. Returns an error envelope to send back to the
/// sender when the frame cannot be relayed.
fn relay_text(text: &str, state: &RelayState) -> Option<Envelope> {
    match Envelope::decode(text) {
        Ok(Inbound::Known(Envelope::GazeData(_))) | Ok(Inbound::Known(Envelope::PageChange(_))) => {
            // Verbatim fan-out. Send only fails with zero subscribers,
            // which cannot happen while this connection is alive.
            let _ = state.broadcast_tx.send(text.to_string());
            None
        }
        Ok(Inbound::Known(other)) => {
            warn!(kind = other.kind(), "server-originated type from client, dropped");
            None
        }
        Ok(Inbound::Unknown { kind }) => {
            warn!(kind = %kind, "unknown message type");
            Some(Envelope::error(format!("unknown message type: {}", kind)))
        }
        Err(e) => {
            warn!(error = %e, "malformed frame");
            Some(Envelope::error(format!("invalid message: {}", e)))
        }
    }
}

fn announce_count(state: &RelayState) {
    let envelope = Envelope::client_count(
        state.client_count(),
        chrono::Utc::now().timestamp_millis(),
    );
    match envelope.encode() {
        Ok(json) => {
            let _ = state.broadcast_tx.send(json);
        }
        Err(e) => warn!(error = %e, "failed to encode client count"),
    }
}
