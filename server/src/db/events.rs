//! Queries for `events`.

use club_engine::ClubEvent;
use sqlx::{PgPool, Row};

use super::profile_summary;

/// An event row with its organizer's profile joined in.
#[derive(Debug)]
pub struct StoredEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: i64,
    pub ends_at: Option<i64>,
    pub capacity: Option<i32>,
    pub created_at: i64,
    pub organizer_name: Option<String>,
    pub organizer_avatar: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEvent {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
            capacity: row.try_get("capacity")?,
            created_at: row.try_get("created_at")?,
            organizer_name: row.try_get("display_name")?,
            organizer_avatar: row.try_get("avatar_url")?,
        })
    }
}

impl StoredEvent {
    pub fn into_event(self) -> ClubEvent {
        ClubEvent {
            id: self.id,
            title: self.title,
            description: self.description,
            location: self.location,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            // The column is checked non-negative
            capacity: self.capacity.and_then(|c| u32::try_from(c).ok()),
            created_at: self.created_at,
            organizer: profile_summary(self.organizer_name, self.organizer_avatar),
        }
    }
}

/// Fields of an event to create.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: i64,
    pub ends_at: Option<i64>,
    pub capacity: Option<u32>,
}

const SELECT_EVENT: &str = r#"
    SELECT e.id, e.title, e.description, e.location, e.starts_at, e.ends_at,
           e.capacity, e.created_at, p.display_name, p.avatar_url
    FROM events e
    LEFT JOIN profiles p ON p.id = e.organizer_id
"#;

/// Events starting in `[start, end)`, in creation order.
pub async fn list_starting_between(
    pool: &PgPool,
    start: i64,
    end: i64,
    limit: i64,
) -> Result<Vec<ClubEvent>, sqlx::Error> {
    let query = format!(
        "{SELECT_EVENT} WHERE e.starts_at >= $1 AND e.starts_at < $2 \
         ORDER BY e.created_at ASC, e.id ASC LIMIT $3"
    );
    let rows = sqlx::query_as::<_, StoredEvent>(&query)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(StoredEvent::into_event).collect())
}

/// Get one event with its organizer.
pub async fn get(pool: &PgPool, id: &str) -> Result<Option<ClubEvent>, sqlx::Error> {
    let query = format!("{SELECT_EVENT} WHERE e.id = $1");
    let row = sqlx::query_as::<_, StoredEvent>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(StoredEvent::into_event))
}

/// Insert an event organized by `organizer_id`.
pub async fn insert(
    pool: &PgPool,
    id: &str,
    event: &NewEvent,
    organizer_id: &str,
    created_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO events (
            id, title, description, location, starts_at, ends_at,
            capacity, organizer_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.location)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(event.capacity.map(|c| i32::try_from(c).unwrap_or(i32::MAX)))
    .bind(organizer_id)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(())
}
