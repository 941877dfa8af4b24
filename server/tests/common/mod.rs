//! Shared helpers for integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use relay_server::config::ConnectionsConfig;
use relay_server::relay::RelayService;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return (base_url, addr, relay).
pub async fn start_test_server() -> (String, SocketAddr, Arc<RelayService>) {
    start_test_server_with(ConnectionsConfig::default()).await
}

/// Same as `start_test_server`, with custom per-connection settings.
pub async fn start_test_server_with(
    connections: ConnectionsConfig,
) -> (String, SocketAddr, Arc<RelayService>) {
    let relay = Arc::new(RelayService::new(500));
    let state = relay_server::state::AppState::new(relay.clone(), connections);

    let app = relay_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (format!("http://{}", addr), addr, relay)
}

pub async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect to WebSocket");
    ws
}

/// Connect and register `identity` with an `init` frame.
pub async fn connect_as(addr: SocketAddr, identity: &str) -> WsStream {
    let mut ws = connect(addr).await;
    send_json(&mut ws, serde_json::json!({ "type": "init", "userId": identity })).await;
    ws
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Give the server time to process frames sent on other connections.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

/// Next JSON text frame, skipping control frames. Panics after 2 seconds.
pub async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a frame within timeout");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).expect("Server sent invalid JSON");
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected text frame, got: {:?}", other),
        }
    }
}

/// Assert nothing but control frames arrive for a short while.
pub async fn assert_silent(ws: &mut WsStream) {
    loop {
        match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            Ok(other) => panic!("Expected no frames, got: {:?}", other),
        }
    }
}

pub async fn get_health(base_url: &str) -> Value {
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}
