//! Integration tests for WebSocket registration, direct and group routing.

mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

use relay_server::config::ConnectionsConfig;

use common::{
    assert_silent, connect, connect_as, get_health, recv_json, send_json, settle,
    start_test_server, start_test_server_with,
};

#[tokio::test]
async fn test_direct_message_delivered_to_both_parties() {
    let (base_url, addr, _relay) = start_test_server().await;
    let mut alice = connect_as(addr, "alice").await;
    let mut bob = connect_as(addr, "bob").await;
    settle().await;

    send_json(
        &mut alice,
        json!({
            "type": "message",
            "channelId": "alice_bob",
            "senderId": "alice",
            "content": "hi bob"
        }),
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let frame = recv_json(ws).await;
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["channelId"], "alice_bob");
        assert_eq!(frame["chatMessage"]["userId"], "alice");
        assert_eq!(frame["chatMessage"]["content"], "hi bob");
        assert!(frame["chatMessage"]["timestamp"].as_i64().unwrap() > 0);
    }

    let history: serde_json::Value = reqwest::get(format!(
        "{}/api/channels/alice_bob/messages",
        base_url
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_direct_message_to_absent_party_is_skipped() {
    let (_base_url, addr, relay) = start_test_server().await;
    let mut alice = connect_as(addr, "alice").await;
    settle().await;

    send_json(
        &mut alice,
        json!({
            "type": "message",
            "channelId": "alice_carol",
            "userId": "alice",
            "content": "anyone?"
        }),
    )
    .await;

    assert_eq!(recv_json(&mut alice).await["chatMessage"]["content"], "anyone?");
    assert_eq!(relay.store.direct_history("alice_carol").len(), 1);
}

#[tokio::test]
async fn test_group_message_deduplicates_members() {
    let (_base_url, addr, relay) = start_test_server().await;
    let mut a = connect_as(addr, "A").await;
    let mut b = connect_as(addr, "B").await;
    let mut c = connect_as(addr, "C").await;
    settle().await;

    send_json(
        &mut a,
        json!({
            "type": "group_message",
            "groupId": "team",
            "senderId": "A",
            "content": "standup",
            "groupMembers": ["A", "B", "C", "B"],
            "senderName": "Alice"
        }),
    )
    .await;

    for ws in [&mut a, &mut b, &mut c] {
        let frame = recv_json(ws).await;
        assert_eq!(frame["type"], "group_message");
        assert_eq!(frame["groupId"], "team");
        assert_eq!(frame["senderId"], "A");
        assert_eq!(frame["isFile"], false);
        assert_eq!(frame["senderName"], "Alice");
        // Exactly one copy per member
        assert_silent(ws).await;
    }
    assert_eq!(relay.store.group_history("team").len(), 1);
}

#[tokio::test]
async fn test_group_sender_receives_own_message() {
    let (_base_url, addr, _relay) = start_test_server().await;
    let mut a = connect_as(addr, "A").await;
    settle().await;

    send_json(
        &mut a,
        json!({
            "type": "group_message",
            "groupId": "g",
            "senderId": "A",
            "content": "just me",
            "groupMembers": ["B", "C"]
        }),
    )
    .await;

    assert_eq!(recv_json(&mut a).await["content"], "just me");
}

#[tokio::test]
async fn test_reregistration_survives_stale_close() {
    let (base_url, addr, relay) = start_test_server().await;
    let mut first = connect_as(addr, "A").await;
    settle().await;
    let mut second = connect_as(addr, "A").await;
    let mut bob = connect_as(addr, "B").await;
    settle().await;

    // Old connection closes after being superseded
    first.send(Message::Close(None)).await.unwrap();
    drop(first);
    settle().await;

    assert!(relay.registry.lookup("A").is_some());
    assert_eq!(get_health(&base_url).await["connectedClients"], 2);

    send_json(
        &mut bob,
        json!({ "type": "message", "channelId": "A_B", "senderId": "B", "content": "ping" }),
    )
    .await;
    assert_eq!(recv_json(&mut second).await["chatMessage"]["content"], "ping");
    assert_eq!(recv_json(&mut bob).await["chatMessage"]["content"], "ping");
}

#[tokio::test]
async fn test_disconnect_deregisters() {
    let (base_url, addr, _relay) = start_test_server().await;
    let mut alice = connect_as(addr, "alice").await;
    settle().await;
    assert_eq!(get_health(&base_url).await["connectedClients"], 1);

    alice.send(Message::Close(None)).await.unwrap();
    drop(alice);
    settle().await;
    assert_eq!(get_health(&base_url).await["connectedClients"], 0);
}

#[tokio::test]
async fn test_close_unregistered_connection_is_harmless() {
    let (base_url, addr, _relay) = start_test_server().await;
    let _alice = connect_as(addr, "alice").await;
    settle().await;

    let mut anonymous = connect(addr).await;
    anonymous.send(Message::Close(None)).await.unwrap();
    drop(anonymous);
    settle().await;

    assert_eq!(get_health(&base_url).await["connectedClients"], 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_keep_connection_usable() {
    let (base_url, addr, _relay) = start_test_server().await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({ "type": "typing", "channelId": "x_y" })).await;
    ws.send(Message::Text("{definitely not json".into()))
        .await
        .unwrap();
    send_json(&mut ws, json!({ "type": "message", "senderId": "x" })).await;
    assert_silent(&mut ws).await;

    let health = get_health(&base_url).await;
    assert_eq!(health["directChannels"], 0);
    assert_eq!(health["groupChannels"], 0);

    // Same connection still works for valid frames
    send_json(&mut ws, json!({ "type": "init", "userId": "x" })).await;
    send_json(
        &mut ws,
        json!({ "type": "message", "channelId": "x_y", "senderId": "x", "content": "ok" }),
    )
    .await;
    assert_eq!(recv_json(&mut ws).await["chatMessage"]["content"], "ok");
}

#[tokio::test]
async fn test_back_to_back_messages_keep_order() {
    let (base_url, addr, _relay) = start_test_server().await;
    let mut a = connect_as(addr, "A").await;
    let mut b = connect_as(addr, "B").await;
    settle().await;

    send_json(
        &mut a,
        json!({ "type": "message", "channelId": "A_B", "senderId": "A", "content": "one" }),
    )
    .await;
    assert_eq!(recv_json(&mut b).await["chatMessage"]["content"], "one");
    send_json(
        &mut b,
        json!({ "type": "message", "channelId": "A_B", "senderId": "B", "content": "two" }),
    )
    .await;
    assert_eq!(recv_json(&mut a).await["chatMessage"]["content"], "one");
    assert_eq!(recv_json(&mut a).await["chatMessage"]["content"], "two");

    let history: Vec<serde_json::Value> =
        reqwest::get(format!("{}/api/channels/A_B/messages", base_url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    let contents: Vec<_> = history.iter().map(|m| m["content"].clone()).collect();
    assert_eq!(contents, vec![json!("one"), json!("two")]);
    assert_eq!(history[0]["userId"], "A");
    assert_eq!(history[1]["userId"], "B");
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (_base_url, addr, _relay) = start_test_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected pong within timeout");

    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => {
            panic!("Expected Pong message, got: {:?}", other);
        }
    }
}

#[tokio::test]
async fn test_missed_pong_closes_with_1001_and_deregisters() {
    let (base_url, addr, _relay) = start_test_server_with(ConnectionsConfig {
        ping_interval_secs: 1,
        pong_timeout_secs: 1,
        ..Default::default()
    })
    .await;
    let mut ws = connect_as(addr, "sleepy").await;
    settle().await;
    assert_eq!(get_health(&base_url).await["connectedClients"], 1);

    // Not polling the stream means the client never answers the server's ping
    tokio::time::sleep(Duration::from_secs(3)).await;

    let frame = loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a close frame within timeout");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => break frame,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected close frame, got: {:?}", other),
        }
    };
    assert_eq!(u16::from(frame.code), 1001);
    assert_eq!(frame.reason.as_str(), "Pong timeout");

    settle().await;
    assert_eq!(get_health(&base_url).await["connectedClients"], 0);
}
