//! # Club Engine
//!
//! The live list core of the startup club community app.
//!
//! Chat rooms, the event calendar and per-event registration lists all follow
//! the same pattern: load a snapshot for a scope, subscribe to change events
//! for that scope, fetch each inserted record with its display fields joined
//! in, and merge it into the client-held list. This crate holds every piece of
//! that pattern that does not need IO.
//!
//! ## Design Principles
//!
//! - **No IO**: fetching, subscribing and timers live in `club-client`
//! - **Pure merges**: reconciliation returns a new collection and never
//!   mutates its input
//! - **Typed rows**: server JSON is validated against a per-table schema
//!   before it becomes a record
//!
//! ## Core Concepts
//!
//! ### Scopes
//!
//! A [`ScopeKey`] names one live collection: a chat room, a calendar month,
//! or the registrations of one event. Each scope maps to exactly one
//! [`Table`].
//!
//! ### Records
//!
//! [`ChatMessage`], [`ClubEvent`] and [`Registration`] implement
//! [`LiveRecord`], which exposes the id, the ordering timestamp and scope
//! membership.
//!
//! ### Reconciliation
//!
//! [`merge`] appends an incoming record unless its id is already present.
//! Duplicate delivery is therefore harmless. Records are appended in arrival
//! order, not re-sorted.
//!
//! ### Live view
//!
//! [`LiveView`] combines a scope, its [`OrderedCollection`], the channel
//! lifecycle ([`ChannelMachine`]) and a [`ScopeEpoch`] guard so that results
//! fetched for a previous mount are discarded.
//!
//! ## Quick Start
//!
//! ```rust
//! use club_engine::{merge, ChatMessage, OrderedCollection};
//!
//! let empty: OrderedCollection<ChatMessage> = OrderedCollection::new();
//! let m1 = ChatMessage::new("m1", "general", "ada", "hello", 1_000);
//!
//! let once = merge(&empty, m1.clone());
//! let twice = merge(&once, m1);
//!
//! assert_eq!(once.len(), 1);
//! assert!(twice.ptr_eq(&once));
//! ```

pub mod change;
pub mod channel;
pub mod collection;
pub mod error;
pub mod realtime;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod scope;
pub mod view;

// Re-export main types at crate root
pub use change::{ChangeEvent, ChangeOp};
pub use channel::{ChannelMachine, ChannelPhase};
pub use collection::OrderedCollection;
pub use error::Error;
pub use realtime::{ClientFrame, ServerFrame};
pub use reconcile::{merge, reconcile, Change, MergeOutcome};
pub use record::{
    ChatMessage, ClubEvent, LiveRecord, ProfileSummary, Registration, RegistrationStatus, Table,
};
pub use schema::{decode_row, decode_rows, FieldDef, FieldType, Schema, TableSchema};
pub use scope::ScopeKey;
pub use view::{Applied, LiveView, ReactionPolicy, ScopeEpoch};

/// Type aliases for clarity
pub type RecordId = String;
pub type ProfileId = String;
pub type RoomId = String;
pub type EventId = String;
/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;
