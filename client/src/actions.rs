//! User actions bound to live lists.
//!
//! Every action is a gateway mutation followed by nothing: the list learns
//! about the write the same way it learns about anyone else's, through its
//! subscription.

use crate::error::{ClientError, Result};
use crate::gateway::{Mutation, MutationReceipt};
use crate::live::LiveList;
use club_engine::{ChatMessage, ClubEvent, Registration, ScopeKey};

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

impl LiveList<ChatMessage> {
    /// Post `text` to the list's room.
    ///
    /// Surrounding whitespace is trimmed. Empty messages and messages longer
    /// than [`MAX_MESSAGE_CHARS`] are rejected without contacting the backend.
    pub async fn send_message(&self, text: &str) -> Result<MutationReceipt> {
        const ACTION: &str = "send_message";

        let ScopeKey::Room { room_id } = self.scope() else {
            return Err(ClientError::mutation(ACTION, "list is not a chat room"));
        };

        let content = text.trim();
        if content.is_empty() {
            return Err(ClientError::mutation(ACTION, "message is empty"));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ClientError::mutation(
                ACTION,
                format!("message is longer than {MAX_MESSAGE_CHARS} characters"),
            ));
        }

        self.perform(Mutation::SendMessage {
            room_id: room_id.clone(),
            content: content.to_string(),
        })
        .await
    }
}

impl LiveList<Registration> {
    /// Register the acting member for the list's event.
    pub async fn register(&self) -> Result<MutationReceipt> {
        let event_id = self.event_id("register")?;
        self.perform(Mutation::Register { event_id }).await
    }

    /// Withdraw the acting member's registration for the list's event.
    pub async fn cancel(&self) -> Result<MutationReceipt> {
        let event_id = self.event_id("cancel")?;
        self.perform(Mutation::CancelRegistration { event_id })
            .await
    }

    fn event_id(&self, action: &'static str) -> Result<String> {
        match self.scope() {
            ScopeKey::Event { event_id } => Ok(event_id.clone()),
            _ => Err(ClientError::mutation(action, "list is not an event")),
        }
    }
}

impl LiveList<ClubEvent> {
    /// RSVP to `event_id` from the calendar.
    pub async fn register(&self, event_id: &str) -> Result<MutationReceipt> {
        self.perform(Mutation::Register {
            event_id: event_id.to_string(),
        })
        .await
    }

    /// Withdraw an RSVP made from the calendar.
    pub async fn cancel(&self, event_id: &str) -> Result<MutationReceipt> {
        self.perform(Mutation::CancelRegistration {
            event_id: event_id.to_string(),
        })
        .await
    }
}
