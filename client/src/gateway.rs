//! Remote data gateway port.
//!
//! Live lists never talk to the backend directly. They are handed an
//! `Arc<dyn RemoteGateway>` at mount time, which lets the HTTP gateway and the
//! in-memory gateway used by tests stand in for each other.

use crate::error::GatewayResult;
use async_trait::async_trait;
use club_engine::{ChangeEvent, EventId, RecordId, RoomId, ScopeKey, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// A write requested by a user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Mutation {
    /// Post a message to a chat room as the acting member.
    SendMessage { room_id: RoomId, content: String },
    /// Register the acting member for an event.
    Register { event_id: EventId },
    /// Withdraw the acting member's registration for an event.
    CancelRegistration { event_id: EventId },
}

impl Mutation {
    /// Name of the user action, used in error reports.
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::SendMessage { .. } => "send_message",
            Mutation::Register { .. } => "register",
            Mutation::CancelRegistration { .. } => "cancel",
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Mutation::SendMessage { .. } => Table::ChatMessages,
            Mutation::Register { .. } | Mutation::CancelRegistration { .. } => {
                Table::Registrations
            }
        }
    }
}

/// Acknowledgement of a successful mutation.
///
/// Carries only the affected record id. The record itself becomes visible
/// through the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReceipt {
    pub record_id: RecordId,
}

/// Opaque handle for one open channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    pub id: String,
    pub scope: ScopeKey,
}

/// What a channel reports to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    /// The transport confirmed the subscription
    Acknowledged,
    /// A row in the channel's scope changed
    Change(ChangeEvent),
    /// The transport failed; the channel will not recover on its own
    TransportError(String),
    /// The server closed the channel
    Closed,
}

/// An open channel and the stream of its signals.
#[derive(Debug)]
pub struct Subscription {
    pub handle: ChannelHandle,
    pub signals: mpsc::UnboundedReceiver<ChannelSignal>,
}

/// Client to the hosted backend.
///
/// Implementations must tolerate concurrent calls from several live lists.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch the raw rows of a scope's collection, denormalized fields joined.
    async fn fetch_collection(&self, scope: &ScopeKey) -> GatewayResult<Vec<Value>>;

    /// Fetch one enriched row by id. `None` when the row does not exist.
    async fn fetch_by_id(&self, table: Table, id: &str) -> GatewayResult<Option<Value>>;

    /// Perform a write on behalf of the acting member.
    async fn mutate(&self, mutation: Mutation) -> GatewayResult<MutationReceipt>;

    /// Open a channel for `scope`.
    ///
    /// The returned subscription is not live until it yields
    /// [`ChannelSignal::Acknowledged`].
    async fn subscribe(&self, scope: &ScopeKey) -> GatewayResult<Subscription>;

    /// Close a channel. Closing an already closed channel is a no-op.
    async fn unsubscribe(&self, handle: &ChannelHandle) -> GatewayResult<()>;
}
