//! # Club Client
//!
//! Live lists for the startup club app.
//!
//! A [`LiveList`] shows one scope (a chat room, a calendar month, the
//! registrations of an event) and keeps it current: it loads a snapshot,
//! subscribes to the scope's change events, fetches each changed record with
//! its display fields and merges it with [`club_engine::merge`].
//!
//! All backend access goes through a [`RemoteGateway`] handed in at mount
//! time. [`HttpGateway`] talks to `club-server`; [`MemoryGateway`] keeps
//! everything in process.
//!
//! ```no_run
//! use std::sync::Arc;
//! use club_client::{ClientConfig, HttpGateway, LiveList};
//! use club_engine::{ChatMessage, ScopeKey};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(HttpGateway::new(ClientConfig::from_env()?)?);
//! let mut room: LiveList<ChatMessage> = LiveList::mount(gateway, ScopeKey::room("general"));
//!
//! room.send_message("Demo day is on Friday").await?;
//! let snapshot = room.changed().await?;
//! println!("{} messages", snapshot.collection.len());
//! room.close().await;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod live;
pub mod loader;
pub mod memory;
mod subscription;

pub use actions::MAX_MESSAGE_CHARS;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, GatewayError, GatewayResult};
pub use gateway::{
    ChannelHandle, ChannelSignal, Mutation, MutationReceipt, RemoteGateway, Subscription,
};
pub use http::HttpGateway;
pub use live::{LiveList, LiveSnapshot, LiveStatus};
pub use loader::SnapshotLoader;
pub use memory::{Gate, MemoryGateway};
