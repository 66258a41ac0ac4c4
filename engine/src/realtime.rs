//! Realtime channel frame definitions.
//!
//! All frames are JSON-encoded and use snake_case for field names. One
//! WebSocket connection carries any number of logical channels; each channel
//! is identified by a client-chosen `channel_id` and covers one scope.

use crate::{ChangeEvent, ScopeKey};
use serde::{Deserialize, Serialize};

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Open a channel for a scope.
    Subscribe { channel_id: String, scope: ScopeKey },

    /// Close a channel. Closing an unknown channel is not an error.
    Unsubscribe { channel_id: String },

    /// Keep-alive ping.
    Ping,
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// The channel is live; changes from now on will be delivered.
    Subscribed { channel_id: String },

    /// The channel was closed.
    Unsubscribed { channel_id: String },

    /// A row in the channel's scope changed.
    Change {
        channel_id: String,
        event: ChangeEvent,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        /// Channel the error concerns, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
}

impl ServerFrame {
    /// Create an error frame.
    pub fn error(message: impl Into<String>, channel_id: Option<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
            channel_id,
        }
    }

    /// Channel this frame is addressed to.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            ServerFrame::Subscribed { channel_id }
            | ServerFrame::Unsubscribed { channel_id }
            | ServerFrame::Change { channel_id, .. } => Some(channel_id),
            ServerFrame::Error { channel_id, .. } => channel_id.as_deref(),
            ServerFrame::Pong => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Table;

    #[test]
    fn test_client_frame_deserialization() {
        let json = r#"{"type": "subscribe", "channel_id": "c1", "scope": {"kind": "room", "roomId": "general"}}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                channel_id: "c1".into(),
                scope: ScopeKey::room("general"),
            }
        );

        let json = r#"{"type": "ping"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));
    }

    #[test]
    fn test_server_frame_serialization() {
        let frame = ServerFrame::Pong;
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let frame = ServerFrame::error("bad scope", Some("c1".to_string()));
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""message":"bad scope""#));
        assert!(json.contains(r#""channel_id":"c1""#));

        let frame = ServerFrame::error("bad frame", None);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("channel_id"));
    }

    #[test]
    fn test_change_frame() {
        let frame = ServerFrame::Change {
            channel_id: "c1".into(),
            event: ChangeEvent::insert(Table::ChatMessages, "m1", ScopeKey::room("general")),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"change""#));
        assert!(json.contains(r#""recordId":"m1""#));

        let parsed: ServerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.channel_id(), Some("c1"));
    }
}
