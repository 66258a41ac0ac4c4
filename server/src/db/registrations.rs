//! Queries for `event_registrations`.
//!
//! Registering and cancelling lock the event row so that the seat count seen
//! by one transaction cannot change underneath it.

use club_engine::{Registration, RegistrationStatus};
use sqlx::{PgConnection, PgPool, Row};

use super::{is_unique_violation, profile_summary};

/// A registration row with the attendee's profile joined in.
#[derive(Debug)]
pub struct StoredRegistration {
    pub id: String,
    pub event_id: String,
    pub profile_id: String,
    pub status: RegistrationStatus,
    pub created_at: i64,
    pub attendee_name: Option<String>,
    pub attendee_avatar: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRegistration {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(StoredRegistration {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            profile_id: row.try_get("profile_id")?,
            status: parse_status(&status)?,
            created_at: row.try_get("created_at")?,
            attendee_name: row.try_get("display_name")?,
            attendee_avatar: row.try_get("avatar_url")?,
        })
    }
}

impl StoredRegistration {
    pub fn into_registration(self) -> Registration {
        Registration {
            id: self.id,
            event_id: self.event_id,
            profile_id: self.profile_id,
            status: self.status,
            created_at: self.created_at,
            attendee: profile_summary(self.attendee_name, self.attendee_avatar),
        }
    }
}

fn status_str(status: RegistrationStatus) -> &'static str {
    match status {
        RegistrationStatus::Registered => "registered",
        RegistrationStatus::Waitlisted => "waitlisted",
    }
}

fn parse_status(raw: &str) -> Result<RegistrationStatus, sqlx::Error> {
    match raw {
        "registered" => Ok(RegistrationStatus::Registered),
        "waitlisted" => Ok(RegistrationStatus::Waitlisted),
        other => Err(sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(club_engine::Error::InvalidPayload(format!(
                "unknown registration status '{other}'"
            ))),
        }),
    }
}

const SELECT_REGISTRATION: &str = r#"
    SELECT r.id, r.event_id, r.profile_id, r.status, r.created_at,
           p.display_name, p.avatar_url
    FROM event_registrations r
    LEFT JOIN profiles p ON p.id = r.profile_id
"#;

/// Registrations of an event, in sign-up order.
pub async fn list_for_event(
    pool: &PgPool,
    event_id: &str,
    limit: i64,
) -> Result<Vec<Registration>, sqlx::Error> {
    let query = format!(
        "{SELECT_REGISTRATION} WHERE r.event_id = $1 \
         ORDER BY r.created_at ASC, r.id ASC LIMIT $2"
    );
    let rows = sqlx::query_as::<_, StoredRegistration>(&query)
        .bind(event_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(StoredRegistration::into_registration)
        .collect())
}

/// Get one registration with its attendee.
pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Registration>, sqlx::Error> {
    let query = format!("{SELECT_REGISTRATION} WHERE r.id = $1");
    let row = sqlx::query_as::<_, StoredRegistration>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(StoredRegistration::into_registration))
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created { status: RegistrationStatus },
    EventNotFound,
    AlreadyRegistered,
}

/// Register `profile_id` for `event_id` under the new row id `id`.
///
/// The member is waitlisted when the event's registered seats are all taken.
pub async fn register(
    pool: &PgPool,
    id: &str,
    event_id: &str,
    profile_id: &str,
    created_at: i64,
) -> Result<RegisterOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(capacity) = lock_event(&mut tx, event_id).await? else {
        return Ok(RegisterOutcome::EventNotFound);
    };

    let full = match capacity {
        Some(capacity) => registered_count(&mut tx, event_id).await? >= i64::from(capacity),
        None => false,
    };
    let status = if full {
        RegistrationStatus::Waitlisted
    } else {
        RegistrationStatus::Registered
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO event_registrations (id, event_id, profile_id, status, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(event_id)
    .bind(profile_id)
    .bind(status_str(status))
    .bind(created_at)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Ok(RegisterOutcome::AlreadyRegistered),
        Err(e) => return Err(e),
    }

    tx.commit().await?;
    Ok(RegisterOutcome::Created { status })
}

/// A removed registration and the waitlisted one that took its seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub id: String,
    pub promoted: Option<String>,
}

/// Remove the registration of `profile_id` for `event_id`.
///
/// When a registered seat frees up, the longest-waiting waitlisted member is
/// promoted. Returns `None` if the member was not registered.
pub async fn cancel(
    pool: &PgPool,
    event_id: &str,
    profile_id: &str,
) -> Result<Option<Cancelled>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(capacity) = lock_event(&mut tx, event_id).await? else {
        return Ok(None);
    };

    let removed = sqlx::query(
        r#"
        DELETE FROM event_registrations
        WHERE event_id = $1 AND profile_id = $2
        RETURNING id, status
        "#,
    )
    .bind(event_id)
    .bind(profile_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(removed) = removed else {
        return Ok(None);
    };
    let id: String = removed.try_get("id")?;
    let status: String = removed.try_get("status")?;

    let freed_seat = match capacity {
        Some(capacity) if parse_status(&status)? == RegistrationStatus::Registered => {
            registered_count(&mut tx, event_id).await? < i64::from(capacity)
        }
        _ => false,
    };
    let promoted = if freed_seat {
        promote_next(&mut tx, event_id).await?
    } else {
        None
    };

    tx.commit().await?;
    Ok(Some(Cancelled { id, promoted }))
}

/// Lock the event row. Outer `None` when the event does not exist, inner
/// `None` when it has no capacity limit.
async fn lock_event(
    conn: &mut PgConnection,
    event_id: &str,
) -> Result<Option<Option<i32>>, sqlx::Error> {
    let row = sqlx::query("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| row.try_get("capacity")).transpose()
}

async fn registered_count(conn: &mut PgConnection, event_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND status = 'registered'",
    )
    .bind(event_id)
    .fetch_one(&mut *conn)
    .await
}

async fn promote_next(
    conn: &mut PgConnection,
    event_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE event_registrations SET status = 'registered'
        WHERE id = (
            SELECT id FROM event_registrations
            WHERE event_id = $1 AND status = 'waitlisted'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
        )
        RETURNING id
        "#,
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| row.try_get("id")).transpose()
}
