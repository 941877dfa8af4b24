use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::ConnectionHandle;

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the handle's bounded outbound queue
/// - Ping task: sends periodic pings and closes the socket on a missed pong
/// - Reader loop: decodes text frames and hands them to the relay
///
/// The connection is registered lazily, when an `init` frame arrives, and
/// deregistered here once the reader loop exits.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (handle, rx) = ConnectionHandle::new(state.connections.outbound_queue_capacity);
    let conn_id = handle.id();

    tracing::debug!(conn_id = %conn_id, "WebSocket actor started");

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));
    let mut writer_done = false;

    // Track pong reception
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = tokio::spawn(ping_task(
        handle.clone(),
        pong_rx,
        Duration::from_secs(state.connections.ping_interval_secs.max(1)),
        Duration::from_secs(state.connections.pong_timeout_secs.max(1)),
    ));

    loop {
        let incoming = tokio::select! {
            incoming = ws_receiver.next() => incoming,
            _ = &mut writer_handle => {
                // Sink failed or we sent a close frame
                writer_done = true;
                tracing::debug!(conn_id = %conn_id, "Writer finished, closing connection");
                break;
            }
        };

        match incoming {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &handle, &state.relay);
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        len = data.len(),
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = handle.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::debug!(conn_id = %conn_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Stop the writer first so the handle reports closed before it leaves
    // the registry; any in-flight fan-out then skips it.
    ping_handle.abort();
    if !writer_done {
        writer_handle.abort();
        let _ = writer_handle.await;
    }

    let removed = state.relay.registry.deregister(&handle);
    for identity in &removed {
        tracing::info!(
            identity = %identity,
            conn_id = %conn_id,
            remaining_clients = state.relay.registry.len(),
            "User disconnected"
        );
    }

    tracing::debug!(conn_id = %conn_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from the outbound queue and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Ping task: pings every `every`, closes with 1001 if no pong arrives within `deadline`.
async fn ping_task(
    handle: ConnectionHandle,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    every: Duration,
    deadline: Duration,
) {
    let mut ping_timer = interval(every);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if !handle.is_open() {
            break;
        }
        // A full queue just skips this ping; the pong wait still applies.
        let _ = handle.send(Message::Ping(vec![1, 2, 3, 4].into()));

        match timeout(deadline, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!(conn_id = %handle.id(), "Pong timeout, closing connection");
                let _ = handle.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}
