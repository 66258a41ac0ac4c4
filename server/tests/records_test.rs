//! Rows as served by the snapshot and record endpoints.
//!
//! Each document is what the server emits for a joined row; the client must
//! decode it with the table schema.

use club_engine::{
    decode_row, decode_rows, ChatMessage, ClubEvent, LiveRecord, Registration,
    RegistrationStatus, ScopeKey,
};
use serde_json::json;

#[cfg(test)]
mod served_row_tests {
    use super::*;

    #[test]
    fn test_room_snapshot_decodes_in_order() {
        let rows = vec![
            json!({
                "id": "m1", "roomId": "general", "senderId": "ada",
                "content": "Pitch practice at 6?", "createdAt": 1_000,
                "sender": {"displayName": "Ada", "avatarUrl": "https://cdn/ada.png"}
            }),
            json!({
                "id": "m2", "roomId": "general", "senderId": "grace",
                "content": "Count me in", "createdAt": 2_000,
                "sender": {"displayName": "Grace"}
            }),
        ];

        let messages: Vec<ChatMessage> = decode_rows(rows).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
        assert_eq!(
            messages[0].sender.as_ref().and_then(|s| s.avatar_url.as_deref()),
            Some("https://cdn/ada.png")
        );
    }

    #[test]
    fn test_sender_without_profile_row() {
        // LEFT JOIN found no profile
        let row = json!({
            "id": "m3", "roomId": "general", "senderId": "ghost",
            "content": "hello?", "createdAt": 3_000
        });

        let message: ChatMessage = decode_row(row).unwrap();
        assert_eq!(message.sender, None);
        assert!(message.belongs_to(&ScopeKey::room("general")));
    }

    #[test]
    fn test_event_row() {
        // 2026-10-31T23:00:00Z
        let row = json!({
            "id": "e1", "title": "Demo night", "location": "Hall B",
            "startsAt": 1_793_487_600_000_i64, "capacity": 40,
            "createdAt": 1_000,
            "organizer": {"displayName": "Grace"}
        });

        let event: ClubEvent = decode_row(row).unwrap();
        assert_eq!(event.capacity, Some(40));
        assert_eq!(event.home_scope(), Some(ScopeKey::month(2026, 10)));
    }

    #[test]
    fn test_waitlisted_registration_row() {
        let row = json!({
            "id": "r2", "eventId": "e1", "profileId": "linus",
            "status": "waitlisted", "createdAt": 5_000,
            "attendee": {"displayName": "Linus"}
        });

        let registration: Registration = decode_row(row).unwrap();
        assert_eq!(registration.status, RegistrationStatus::Waitlisted);
        assert_eq!(registration.home_scope(), Some(ScopeKey::event("e1")));
    }

    #[test]
    fn test_row_with_wrong_types_is_malformed() {
        let row = json!({
            "id": "r3", "eventId": "e1", "profileId": "linus",
            "status": "maybe", "createdAt": "yesterday"
        });

        assert!(decode_row::<Registration>(row).is_err());
    }
}
