//! Lifecycle of one scope's change-event channel.
//!
//! ```text
//! Closed --open--> Opening --ack--> Subscribed --close--> Closed (terminal)
//!                     \------------close-------------------^
//! ```
//!
//! Events are only accepted while `Subscribed`. Anything that arrives while
//! the channel is still `Opening` is dropped. Closing is idempotent and a
//! closed machine can never be reopened; a new scope gets a new machine.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPhase {
    Closed,
    Opening,
    Subscribed,
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPhase::Closed => f.write_str("closed"),
            ChannelPhase::Opening => f.write_str("opening"),
            ChannelPhase::Subscribed => f.write_str("subscribed"),
        }
    }
}

/// State machine for a single subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMachine {
    phase: ChannelPhase,
    torn_down: bool,
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMachine {
    pub fn new() -> Self {
        Self {
            phase: ChannelPhase::Closed,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Whether the machine reached its terminal state.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Whether change events should be processed.
    pub fn accepts_events(&self) -> bool {
        self.phase == ChannelPhase::Subscribed
    }

    /// `Closed -> Opening`. Only valid once.
    pub fn begin_open(&mut self) -> Result<()> {
        if self.phase != ChannelPhase::Closed || self.torn_down {
            return Err(self.invalid("open"));
        }
        self.phase = ChannelPhase::Opening;
        Ok(())
    }

    /// `Opening -> Subscribed` on transport acknowledgement.
    ///
    /// A repeated acknowledgement while subscribed is ignored.
    pub fn acknowledge(&mut self) -> Result<()> {
        match self.phase {
            ChannelPhase::Opening => {
                self.phase = ChannelPhase::Subscribed;
                Ok(())
            }
            ChannelPhase::Subscribed => Ok(()),
            ChannelPhase::Closed => Err(self.invalid("acknowledge")),
        }
    }

    /// Close the channel.
    ///
    /// Returns `true` if this call performed the teardown and `false` if the
    /// channel was already torn down.
    pub fn close(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.phase = ChannelPhase::Closed;
        self.torn_down = true;
        true
    }

    fn invalid(&self, action: &str) -> Error {
        Error::InvalidTransition {
            from: self.phase.to_string(),
            action: action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut channel = ChannelMachine::new();
        assert_eq!(channel.phase(), ChannelPhase::Closed);
        assert!(!channel.accepts_events());

        channel.begin_open().unwrap();
        assert_eq!(channel.phase(), ChannelPhase::Opening);
        assert!(!channel.accepts_events());

        channel.acknowledge().unwrap();
        assert_eq!(channel.phase(), ChannelPhase::Subscribed);
        assert!(channel.accepts_events());

        assert!(channel.close());
        assert_eq!(channel.phase(), ChannelPhase::Closed);
        assert!(!channel.accepts_events());
    }

    #[test]
    fn close_is_idempotent() {
        let mut channel = ChannelMachine::new();
        channel.begin_open().unwrap();
        assert!(channel.close());
        assert!(!channel.close());
        assert!(channel.is_torn_down());
    }

    #[test]
    fn cannot_reopen_after_close() {
        let mut channel = ChannelMachine::new();
        channel.begin_open().unwrap();
        channel.close();

        let err = channel.begin_open().unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition {
                from: "closed".into(),
                action: "open".into()
            }
        );
    }

    #[test]
    fn cannot_open_twice() {
        let mut channel = ChannelMachine::new();
        channel.begin_open().unwrap();
        assert!(channel.begin_open().is_err());
    }

    #[test]
    fn late_ack_after_close_rejected() {
        let mut channel = ChannelMachine::new();
        channel.begin_open().unwrap();
        channel.close();
        assert!(channel.acknowledge().is_err());
        assert!(!channel.accepts_events());
    }

    #[test]
    fn repeated_ack_ignored() {
        let mut channel = ChannelMachine::new();
        channel.begin_open().unwrap();
        channel.acknowledge().unwrap();
        channel.acknowledge().unwrap();
        assert_eq!(channel.phase(), ChannelPhase::Subscribed);
    }
}
