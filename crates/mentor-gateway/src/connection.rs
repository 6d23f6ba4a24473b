use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::info;

use mentor_store::RecordStore;

use crate::dispatch;
use crate::registry::Registry;

/// Run one WebSocket connection: register it in the broadcast set, pump
/// queued outbound frames to the socket, and dispatch inbound text frames
/// until the peer goes away.
///
/// Frames on this connection are handled to completion in arrival order;
/// handlers for different connections interleave at await points.
pub async fn handle_socket(socket: WebSocket, registry: Registry, store: Arc<dyn RecordStore>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut outbound) = registry.register().await;

    info!(
        "connection {} opened ({} total)",
        conn_id,
        registry.count().await
    );

    // Forward queued outbound frames to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    dispatch::handle_frame(&recv_registry, &store, conn_id, &text).await;
                }
                Message::Close(_) => break,
                // Binary and ping/pong frames are not part of the protocol.
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(conn_id).await;
    info!("connection {} closed", conn_id);
}
