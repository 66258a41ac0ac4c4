//! Queries for `chat_messages`.

use club_engine::ChatMessage;
use sqlx::{PgPool, Row};

use super::profile_summary;

/// A message row with its sender's profile joined in.
#[derive(Debug)]
pub struct StoredMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: i64,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredMessage {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredMessage {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            sender_name: row.try_get("display_name")?,
            sender_avatar: row.try_get("avatar_url")?,
        })
    }
}

impl StoredMessage {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at,
            sender: profile_summary(self.sender_name, self.sender_avatar),
        }
    }
}

const SELECT_MESSAGE: &str = r#"
    SELECT m.id, m.room_id, m.sender_id, m.content, m.created_at,
           p.display_name, p.avatar_url
    FROM chat_messages m
    LEFT JOIN profiles p ON p.id = m.sender_id
"#;

/// The most recent `limit` messages of a room, oldest first.
pub async fn list_for_room(
    pool: &PgPool,
    room_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let query = format!(
        "SELECT * FROM ({SELECT_MESSAGE} WHERE m.room_id = $1 \
         ORDER BY m.created_at DESC, m.id DESC LIMIT $2) recent \
         ORDER BY created_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, StoredMessage>(&query)
        .bind(room_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(StoredMessage::into_message).collect())
}

/// Get one message with its sender.
pub async fn get(pool: &PgPool, id: &str) -> Result<Option<ChatMessage>, sqlx::Error> {
    let query = format!("{SELECT_MESSAGE} WHERE m.id = $1");
    let row = sqlx::query_as::<_, StoredMessage>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(StoredMessage::into_message))
}

/// Whether a chat room exists.
pub async fn room_exists(pool: &PgPool, room_id: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS found FROM chat_rooms WHERE id = $1")
        .bind(room_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Insert a message.
pub async fn insert(
    pool: &PgPool,
    id: &str,
    room_id: &str,
    sender_id: &str,
    content: &str,
    created_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO chat_messages (id, room_id, sender_id, content, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(room_id)
    .bind(sender_id)
    .bind(content)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(())
}
