pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws/users/{user_id}/images     WebSocket (progress push)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/ws/users/{user_id}/images", get(ws::ws_handler))
}
