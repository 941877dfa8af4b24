use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    response::Response,
};
use std::net::SocketAddr;

use crate::state::AppState;
use crate::ws::actor;

/// GET / or /ws
/// WebSocket upgrade endpoint. No authentication: the client identifies
/// itself with an `init` frame after the upgrade.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!(peer = %peer, "New WebSocket connection");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
