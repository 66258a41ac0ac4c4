//! HTTP route definitions.

mod events;
mod health;
mod realtime;
mod records;
mod rooms;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(rooms::routes())
        .merge(events::routes())
        .merge(records::routes())
        .merge(realtime::routes())
}
