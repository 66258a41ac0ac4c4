//! Realtime channels over WebSocket.
//!
//! One connection carries any number of logical channels. Clients open a
//! channel per scope with a `subscribe` frame and receive a `change` frame for
//! every committed write in that scope, their own writes included. Frame
//! types live in `club_engine::realtime`.

mod hub;

pub use hub::ChannelHub;
