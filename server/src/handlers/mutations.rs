//! Writes on behalf of the acting member.
//!
//! Every successful write is published to the realtime hub after it commits.
//! Clients learn about their own writes the same way they learn about
//! everybody else's.

use club_engine::{ChangeEvent, ScopeKey, Table};
use serde::{Deserialize, Serialize};

use crate::db::{self, events::NewEvent, registrations::RegisterOutcome, Pool};
use crate::error::{AppError, Result};
use crate::websocket::ChannelHub;

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Acknowledgement of a write: the id of the affected row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub record_id: String,
}

/// Body of `POST /rooms/{room_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Body of `POST /events`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: i64,
    #[serde(default)]
    pub ends_at: Option<i64>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Post a message to a room.
pub async fn handle_send_message(
    pool: &Pool,
    hub: &ChannelHub,
    sender_id: &str,
    room_id: &str,
    request: SendMessageRequest,
) -> Result<Receipt> {
    let content = validate_message(&request.content)?;
    if !db::messages::room_exists(pool, room_id).await? {
        return Err(AppError::NotFound(format!("room {room_id}")));
    }

    let id = db::new_id();
    db::messages::insert(pool, &id, room_id, sender_id, content, db::now_ms())
        .await
        .map_err(unknown_profile)?;

    tracing::info!(room_id = %room_id, sender_id = %sender_id, message_id = %id, "Message posted");
    hub.publish(&ChangeEvent::insert(
        Table::ChatMessages,
        id.as_str(),
        ScopeKey::room(room_id),
    ));

    Ok(Receipt { record_id: id })
}

/// Create an event on the calendar.
pub async fn handle_create_event(
    pool: &Pool,
    hub: &ChannelHub,
    organizer_id: &str,
    request: CreateEventRequest,
) -> Result<Receipt> {
    let event = validate_event(request)?;

    let id = db::new_id();
    let created_at = db::now_ms();
    db::events::insert(pool, &id, &event, organizer_id, created_at)
        .await
        .map_err(unknown_profile)?;

    tracing::info!(event_id = %id, organizer_id = %organizer_id, title = %event.title, "Event created");
    if let Some(scope) = calendar_month(event.starts_at) {
        hub.publish(&ChangeEvent::insert(Table::Events, id.as_str(), scope));
    }

    Ok(Receipt { record_id: id })
}

/// Register the acting member for an event.
pub async fn handle_register(
    pool: &Pool,
    hub: &ChannelHub,
    profile_id: &str,
    event_id: &str,
) -> Result<Receipt> {
    let id = db::new_id();
    let outcome = db::registrations::register(pool, &id, event_id, profile_id, db::now_ms())
        .await
        .map_err(unknown_profile)?;

    match outcome {
        RegisterOutcome::Created { status } => {
            tracing::info!(event_id = %event_id, profile_id = %profile_id, ?status, "Member registered");
            hub.publish(&ChangeEvent::insert(
                Table::Registrations,
                id.as_str(),
                ScopeKey::event(event_id),
            ));
            Ok(Receipt { record_id: id })
        }
        RegisterOutcome::EventNotFound => Err(AppError::NotFound(format!("event {event_id}"))),
        RegisterOutcome::AlreadyRegistered => Err(AppError::Conflict(
            "already registered for this event".to_string(),
        )),
    }
}

/// Cancel the acting member's registration for an event.
///
/// A waitlisted member promoted into the freed seat is published as an update.
pub async fn handle_cancel(
    pool: &Pool,
    hub: &ChannelHub,
    profile_id: &str,
    event_id: &str,
) -> Result<Receipt> {
    let cancelled = db::registrations::cancel(pool, event_id, profile_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no registration for this event".to_string()))?;

    let scope = ScopeKey::event(event_id);
    tracing::info!(event_id = %event_id, profile_id = %profile_id, "Registration cancelled");
    hub.publish(&ChangeEvent::delete(
        Table::Registrations,
        cancelled.id.as_str(),
        scope.clone(),
    ));

    if let Some(promoted) = &cancelled.promoted {
        tracing::info!(event_id = %event_id, registration_id = %promoted, "Promoted from waitlist");
        hub.publish(&ChangeEvent::update(
            Table::Registrations,
            promoted.as_str(),
            scope,
        ));
    }

    Ok(Receipt {
        record_id: cancelled.id,
    })
}

fn validate_message(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("message is empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "message is longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(content)
}

fn validate_event(request: CreateEventRequest) -> Result<NewEvent> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("event title is empty".to_string()));
    }
    if calendar_month(request.starts_at).is_none() {
        return Err(AppError::BadRequest("event start is out of range".to_string()));
    }
    if request.ends_at.is_some_and(|end| end < request.starts_at) {
        return Err(AppError::BadRequest(
            "event ends before it starts".to_string(),
        ));
    }
    if request.capacity.is_some_and(|c| i32::try_from(c).is_err()) {
        return Err(AppError::BadRequest("event capacity is too large".to_string()));
    }

    Ok(NewEvent {
        title,
        description: non_blank(request.description),
        location: non_blank(request.location),
        starts_at: request.starts_at,
        ends_at: request.ends_at,
        capacity: request.capacity,
    })
}

fn calendar_month(starts_at: i64) -> Option<ScopeKey> {
    ScopeKey::month_containing(starts_at).filter(ScopeKey::is_valid)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Writes by a member without a profile row fail on the foreign key.
fn unknown_profile(err: sqlx::Error) -> AppError {
    if db::is_foreign_key_violation(&err) {
        AppError::Forbidden("no club profile for this member".to_string())
    } else {
        AppError::Database(err)
    }
}
