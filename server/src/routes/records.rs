//! Single-record fetches used to enrich change events.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use club_engine::Table;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::handlers::handle_fetch_record;
use crate::AppState;

/// Create record routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/records/{table}/{id}", get(fetch_record))
}

/// GET /records/{table}/{id} - One row with its display fields, 404 when absent.
async fn fetch_record(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let table: Table = table.parse()?;
    handle_fetch_record(&state.pool, table, &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{table} {id}")))
}
