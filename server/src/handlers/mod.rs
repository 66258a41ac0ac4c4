//! Request handlers shared by the HTTP routes and the realtime socket.

mod mutations;
mod realtime;
mod snapshot;

pub use mutations::*;
pub use realtime::*;
pub use snapshot::*;
