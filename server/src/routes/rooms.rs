//! Chat room routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use club_engine::ScopeKey;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_send_message, handle_snapshot, Receipt, SendMessageRequest};
use crate::AppState;

/// Create chat room routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/rooms/{room_id}/messages",
        get(list_messages).post(send_message),
    )
}

/// GET /rooms/{room_id}/messages - Snapshot of a room.
async fn list_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Value>>> {
    let rows = handle_snapshot(
        &state.pool,
        &ScopeKey::room(room_id),
        state.config.snapshot_limit,
    )
    .await?;
    Ok(Json(rows))
}

/// POST /rooms/{room_id}/messages - Post a message.
async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Receipt>)> {
    let sender_id = auth.require_member()?;
    let receipt =
        handle_send_message(&state.pool, &state.hub, sender_id, &room_id, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
