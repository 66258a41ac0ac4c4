//! Record types for the live tables.

use crate::{scope::ScopeKey, EventId, ProfileId, RecordId, RoomId, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tables that back a live collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ChatMessages,
    Events,
    #[serde(rename = "event_registrations")]
    Registrations,
}

impl Table {
    /// All live tables.
    pub const ALL: [Table; 3] = [Table::ChatMessages, Table::Events, Table::Registrations];

    /// Name of the table as used on the wire and in SQL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::ChatMessages => "chat_messages",
            Table::Events => "events",
            Table::Registrations => "event_registrations",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownTable(s.to_string()))
    }
}

/// A record that can live in an [`OrderedCollection`](crate::OrderedCollection).
pub trait LiveRecord:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Table the record is stored in.
    const TABLE: Table;

    /// Primary key, immutable once created.
    fn id(&self) -> &RecordId;

    /// Ordering timestamp.
    fn created_at(&self) -> Timestamp;

    /// Whether this record is part of the collection named by `scope`.
    fn belongs_to(&self, scope: &ScopeKey) -> bool;

    /// The scope whose collection this record appears in.
    ///
    /// `None` only when the record's scope field cannot be expressed as a
    /// key, such as an event starting outside the supported years.
    fn home_scope(&self) -> Option<ScopeKey>;
}

/// Display fields joined from a member profile at fetch time.
///
/// Not authoritative: recomputed on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// A message posted in a chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: RecordId,
    /// Room the message was posted in. Messages never move between rooms.
    pub room_id: RoomId,
    pub sender_id: ProfileId,
    pub content: String,
    pub created_at: Timestamp,
    /// Sender name and avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ProfileSummary>,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<RecordId>,
        room_id: impl Into<RoomId>,
        sender_id: impl Into<ProfileId>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            created_at,
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: ProfileSummary) -> Self {
        self.sender = Some(sender);
        self
    }
}

impl LiveRecord for ChatMessage {
    const TABLE: Table = Table::ChatMessages;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn belongs_to(&self, scope: &ScopeKey) -> bool {
        matches!(scope, ScopeKey::Room { room_id } if *room_id == self.room_id)
    }

    fn home_scope(&self) -> Option<ScopeKey> {
        Some(ScopeKey::room(self.room_id.clone()))
    }
}

/// A club event shown on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubEvent {
    pub id: EventId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub starts_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<Timestamp>,
    /// Seats available; `None` means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<ProfileSummary>,
}

impl ClubEvent {
    pub fn new(
        id: impl Into<EventId>,
        title: impl Into<String>,
        starts_at: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            location: None,
            starts_at,
            ends_at: None,
            capacity: None,
            created_at,
            organizer: None,
        }
    }
}

impl LiveRecord for ClubEvent {
    const TABLE: Table = Table::Events;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn belongs_to(&self, scope: &ScopeKey) -> bool {
        match scope.month_bounds() {
            Some((start, end)) => self.starts_at >= start && self.starts_at < end,
            None => false,
        }
    }

    fn home_scope(&self) -> Option<ScopeKey> {
        ScopeKey::month_containing(self.starts_at).filter(ScopeKey::is_valid)
    }
}

/// Registration state of a member for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    /// Event was full when the member registered
    Waitlisted,
}

/// A member's registration for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: RecordId,
    pub event_id: EventId,
    pub profile_id: ProfileId,
    pub status: RegistrationStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendee: Option<ProfileSummary>,
}

impl Registration {
    pub fn new(
        id: impl Into<RecordId>,
        event_id: impl Into<EventId>,
        profile_id: impl Into<ProfileId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            profile_id: profile_id.into(),
            status: RegistrationStatus::Registered,
            created_at,
            attendee: None,
        }
    }
}

impl LiveRecord for Registration {
    const TABLE: Table = Table::Registrations;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn belongs_to(&self, scope: &ScopeKey) -> bool {
        matches!(scope, ScopeKey::Event { event_id } if *event_id == self.event_id)
    }

    fn home_scope(&self) -> Option<ScopeKey> {
        Some(ScopeKey::event(self.event_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names() {
        assert_eq!(Table::Registrations.to_string(), "event_registrations");
        assert_eq!(
            "chat_messages".parse::<Table>().unwrap(),
            Table::ChatMessages
        );
        assert!("posts".parse::<Table>().is_err());
        assert_eq!(
            serde_json::to_value(Table::Registrations).unwrap(),
            json!("event_registrations")
        );
    }

    #[test]
    fn message_membership() {
        let msg = ChatMessage::new("m1", "general", "ada", "hi", 1000);
        assert!(msg.belongs_to(&ScopeKey::room("general")));
        assert!(!msg.belongs_to(&ScopeKey::room("random")));
        assert!(!msg.belongs_to(&ScopeKey::event("general")));
    }

    #[test]
    fn event_membership_uses_start_month() {
        // 2026-10-31T23:00:00Z
        let event = ClubEvent::new("e1", "Demo night", 1_793_487_600_000, 0);
        assert!(event.belongs_to(&ScopeKey::month(2026, 10)));
        assert!(!event.belongs_to(&ScopeKey::month(2026, 11)));
        assert_eq!(event.home_scope(), Some(ScopeKey::month(2026, 10)));
    }

    #[test]
    fn registration_membership() {
        let reg = Registration::new("r1", "e1", "ada", 1000);
        assert!(reg.belongs_to(&ScopeKey::event("e1")));
        assert!(!reg.belongs_to(&ScopeKey::event("e2")));
        assert_eq!(reg.home_scope(), Some(ScopeKey::event("e1")));
    }

    #[test]
    fn message_wire_format() {
        let msg = ChatMessage::new("m1", "general", "ada", "hi", 1000)
            .with_sender(ProfileSummary::new("Ada"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "m1",
                "roomId": "general",
                "senderId": "ada",
                "content": "hi",
                "createdAt": 1000,
                "sender": {"displayName": "Ada"}
            })
        );
    }
}
