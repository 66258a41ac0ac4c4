//! Database module for PostgreSQL persistence.

pub mod events;
pub mod messages;
mod pool;
pub mod registrations;

pub use pool::*;

use club_engine::{ProfileSummary, Timestamp};

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh primary key for an inserted row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `err` is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

/// Whether `err` is a foreign key violation.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// Profile fields joined by `LEFT JOIN profiles`; absent when no profile row matched.
fn profile_summary(
    display_name: Option<String>,
    avatar_url: Option<String>,
) -> Option<ProfileSummary> {
    display_name.map(|display_name| ProfileSummary {
        display_name,
        avatar_url,
    })
}
