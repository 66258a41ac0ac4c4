//! Realtime WebSocket endpoint.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::auth::AuthUser;
use crate::handlers::handle_realtime_connection;
use crate::AppState;

/// Create realtime routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/realtime", get(upgrade))
}

/// GET /realtime - Upgrade to a realtime connection.
async fn upgrade(State(state): State<AppState>, auth: AuthUser, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_realtime_connection(socket, hub, auth.profile_id))
}
