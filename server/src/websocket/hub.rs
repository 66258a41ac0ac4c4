//! Realtime channel hub.
//!
//! Tracks WebSocket connections and the logical channels each one has open,
//! and routes change events to every channel whose scope matches.

use std::collections::HashMap;
use std::sync::Arc;

use club_engine::{ChangeEvent, ScopeKey, ServerFrame};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Sender for frames bound to one connection.
pub type FrameSender = mpsc::UnboundedSender<ServerFrame>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Member behind the connection, `None` for anonymous readers
    pub profile_id: Option<String>,
    /// Channel to send frames to this connection
    pub sender: FrameSender,
    /// Open channels by client-chosen id
    channels: HashMap<String, ScopeKey>,
}

/// Endpoint of one logical channel: (connection id, channel id).
type ChannelRef = (String, String);

/// Manages connections and their channels.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ChannelHub {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Open channels by scope.
    by_scope: DashMap<ScopeKey, Vec<ChannelRef>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new hub wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection and return its id.
    pub fn register(&self, profile_id: Option<String>, sender: FrameSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                profile_id,
                sender,
                channels: HashMap::new(),
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");
        conn_id
    }

    /// Unregister a connection and close all of its channels.
    pub fn unregister(&self, conn_id: &str) {
        let Some((_, conn)) = self.connections.remove(conn_id) else {
            return;
        };

        for (channel_id, scope) in &conn.channels {
            self.unindex(scope, conn_id, channel_id);
        }

        tracing::info!(
            conn_id = %conn_id,
            profile_id = ?conn.profile_id,
            channels = conn.channels.len(),
            "WebSocket connection unregistered"
        );
    }

    /// Open `channel_id` on a connection for `scope`.
    ///
    /// Reopening an existing channel id moves it to the new scope. Returns
    /// `false` if the connection is gone.
    pub fn subscribe(&self, conn_id: &str, channel_id: &str, scope: ScopeKey) -> bool {
        let previous = {
            let Some(mut conn) = self.connections.get_mut(conn_id) else {
                return false;
            };
            conn.channels.insert(channel_id.to_string(), scope.clone())
        };

        if let Some(previous) = previous {
            self.unindex(&previous, conn_id, channel_id);
        }
        self.by_scope
            .entry(scope.clone())
            .or_default()
            .push((conn_id.to_string(), channel_id.to_string()));

        tracing::debug!(conn_id = %conn_id, channel_id = %channel_id, scope = %scope, "Channel opened");
        true
    }

    /// Close `channel_id` on a connection. Returns `false` if it was not open.
    pub fn unsubscribe(&self, conn_id: &str, channel_id: &str) -> bool {
        let removed = self
            .connections
            .get_mut(conn_id)
            .and_then(|mut conn| conn.channels.remove(channel_id));

        match removed {
            Some(scope) => {
                self.unindex(&scope, conn_id, channel_id);
                tracing::debug!(conn_id = %conn_id, channel_id = %channel_id, scope = %scope, "Channel closed");
                true
            }
            None => false,
        }
    }

    /// Deliver a change to every channel subscribed to its scope.
    ///
    /// The author's own channels are included. Returns the number of
    /// channels that received the frame.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        // Copy the targets out so no index guard is held while sending
        let targets = match self.by_scope.get(&event.scope) {
            Some(channels) => channels.clone(),
            None => Vec::new(),
        };

        let mut delivered = 0;
        for (conn_id, channel_id) in targets {
            let frame = ServerFrame::Change {
                channel_id,
                event: event.clone(),
            };
            if self.send_to(&conn_id, frame) {
                delivered += 1;
            }
        }

        tracing::debug!(
            operation = %event.operation,
            table = %event.table,
            record_id = %event.record_id,
            scope = %event.scope,
            delivered,
            "Published change"
        );

        delivered
    }

    /// Send a frame to a specific connection.
    pub fn send_to(&self, conn_id: &str, frame: ServerFrame) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of open channels for `scope`.
    pub fn channel_count(&self, scope: &ScopeKey) -> usize {
        self.by_scope.get(scope).map_or(0, |channels| channels.len())
    }

    fn unindex(&self, scope: &ScopeKey, conn_id: &str, channel_id: &str) {
        if let Some(mut channels) = self.by_scope.get_mut(scope) {
            channels.retain(|(c, ch)| !(c == conn_id && ch == channel_id));
            if channels.is_empty() {
                drop(channels);
                self.by_scope.remove_if(scope, |_, channels| channels.is_empty());
            }
        }
    }
}
