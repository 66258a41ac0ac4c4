//! WebSocket connection loop.
//!
//! Opens and closes channels on the hub as the client asks. Change frames are
//! pushed by the hub from the mutation handlers, not from here.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use club_engine::{ClientFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::websocket::ChannelHub;

/// Handle an established WebSocket connection until the client leaves.
pub async fn handle_realtime_connection(
    socket: WebSocket,
    hub: Arc<ChannelHub>,
    profile_id: Option<String>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let conn_id = hub.register(profile_id.clone(), tx);

    tracing::info!(
        conn_id = %conn_id,
        profile_id = ?profile_id,
        "Realtime client connected"
    );

    // Forward frames from the hub to the socket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket frame: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket frame: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = process_frame(&text, &hub, &conn_id);
                hub.send_to(&conn_id, reply);
            }
            Ok(Message::Binary(_)) => {
                hub.send_to(
                    &conn_id,
                    ServerFrame::error("binary frames are not supported", None),
                );
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    hub.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        active_connections = hub.connection_count(),
        "Realtime client disconnected"
    );
}

/// Apply one client frame and return the reply.
fn process_frame(text: &str, hub: &ChannelHub, conn_id: &str) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => return ServerFrame::error(format!("Invalid frame: {}", e), None),
    };

    match frame {
        ClientFrame::Subscribe { channel_id, scope } => {
            if let Err(e) = scope.validate() {
                return ServerFrame::error(e.to_string(), Some(channel_id));
            }
            if hub.subscribe(conn_id, &channel_id, scope) {
                ServerFrame::Subscribed { channel_id }
            } else {
                ServerFrame::error("connection is closing", Some(channel_id))
            }
        }
        ClientFrame::Unsubscribe { channel_id } => {
            // Unknown channels are acknowledged too
            hub.unsubscribe(conn_id, &channel_id);
            ServerFrame::Unsubscribed { channel_id }
        }
        ClientFrame::Ping => ServerFrame::Pong,
    }
}
