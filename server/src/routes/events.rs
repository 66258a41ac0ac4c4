//! Calendar and registration routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use club_engine::ScopeKey;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_cancel, handle_create_event, handle_register, handle_snapshot, CreateEventRequest,
    Receipt,
};
use crate::AppState;

/// Query parameters for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

/// Create calendar routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{event_id}/registrations",
            get(list_registrations)
                .post(register)
                .delete(cancel),
        )
}

/// GET /events?year=&month= - Events starting in one month.
async fn list_events(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<Value>>> {
    let scope = ScopeKey::month(query.year, query.month);
    let rows = handle_snapshot(&state.pool, &scope, state.config.snapshot_limit).await?;
    Ok(Json(rows))
}

/// POST /events - Create an event. Admins only.
async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Receipt>)> {
    let organizer_id = auth.require_admin(&state.config)?;
    let receipt = handle_create_event(&state.pool, &state.hub, organizer_id, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /events/{event_id}/registrations - Registrations of an event.
async fn list_registrations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<Value>>> {
    let rows = handle_snapshot(
        &state.pool,
        &ScopeKey::event(event_id),
        state.config.snapshot_limit,
    )
    .await?;
    Ok(Json(rows))
}

/// POST /events/{event_id}/registrations - Register the acting member.
async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<(StatusCode, Json<Receipt>)> {
    let profile_id = auth.require_member()?;
    let receipt = handle_register(&state.pool, &state.hub, profile_id, &event_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// DELETE /events/{event_id}/registrations - Cancel the acting member's registration.
async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Receipt>> {
    let profile_id = auth.require_member()?;
    let receipt = handle_cancel(&state.pool, &state.hub, profile_id, &event_id).await?;
    Ok(Json(receipt))
}
