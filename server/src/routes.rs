use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::health::{self, HealthSnapshot};
use crate::relay::store::{DirectMessage, GroupMessage};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint; clients may connect on the root path or /ws
    let ws_routes = Router::new()
        .route("/", get(ws_handler::ws_upgrade))
        .route("/ws", get(ws_handler::ws_upgrade));

    let history_routes = Router::new()
        .route("/api/channels/{channel_id}/messages", get(direct_history))
        .route("/api/groups/{group_id}/messages", get(group_history));

    Router::new()
        .merge(ws_routes)
        .merge(history_routes)
        .route("/health", get(health_check))
        .fallback(not_found)
        .with_state(state)
}

/// GET /health — registry and channel log sizes
async fn health_check(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(health::snapshot(&state.relay))
}

/// GET /api/channels/{channel_id}/messages — retained direct messages, oldest first
async fn direct_history(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Json<Vec<DirectMessage>> {
    Json(state.relay.store.direct_history(&channel_id))
}

/// GET /api/groups/{group_id}/messages — retained group messages, oldest first
async fn group_history(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Json<Vec<GroupMessage>> {
    Json(state.relay.store.group_history(&group_id))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
