//! Error types for the live list client.

use club_engine::{RecordId, ScopeKey, Table};
use thiserror::Error;

/// Failures reported by a [`RemoteGateway`](crate::RemoteGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("realtime connection is closed")]
    Disconnected,
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// Result type for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by live lists and their actions.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The snapshot for a scope could not be fetched. Not retried.
    #[error("failed to load {scope}: {reason}")]
    LoadFailed { scope: ScopeKey, reason: String },

    /// The subscription for a scope could not be opened.
    #[error("subscription for {scope} failed: {reason}")]
    SubscriptionFailed { scope: ScopeKey, reason: String },

    /// An enriched record could not be fetched after a change event.
    #[error("could not enrich {table} {record_id}: {reason}")]
    EnrichmentFailed {
        table: Table,
        record_id: RecordId,
        reason: String,
    },

    /// A user action was rejected or could not be delivered.
    #[error("{action} failed: {reason}")]
    MutationFailed {
        action: &'static str,
        reason: String,
    },

    #[error("live list is closed")]
    Closed,

    #[error(transparent)]
    Engine(#[from] club_engine::Error),
}

impl ClientError {
    pub(crate) fn mutation(action: &'static str, reason: impl ToString) -> Self {
        ClientError::MutationFailed {
            action,
            reason: reason.to_string(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
