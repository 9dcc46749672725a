mod common;

use common::*;
use futures_util::StreamExt;
use serde_json::json;
use signaling_relay::{CallId, Identity, IdentityRegistry, RoomTable, ServerConfig};
use std::collections::HashSet;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;

fn participants(server: &TestServer, call: &str) -> HashSet<Identity> {
    server
        .state
        .router()
        .rooms()
        .participants_of(&CallId::from(call))
}

fn ids(names: &[&str]) -> HashSet<Identity> {
    names.iter().map(|n| Identity::from(*n)).collect()
}

#[tokio::test]
async fn test_call_setup_end_to_end() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "A").await;
    let mut bob = connect(&server, "B").await;

    send_json(&mut alice, json!({"type": "JOIN", "callId": "c1"})).await;
    eventually(|| participants(&server, "c1") == ids(&["A"])).await;
    assert_silent(&mut alice).await;

    send_json(&mut bob, json!({"type": "JOIN", "callId": "c1"})).await;
    let ready = json!({"type": "READY", "callId": "c1"});
    assert_eq!(recv_json(&mut alice).await, ready);
    assert_eq!(recv_json(&mut bob).await, ready);

    send_json(
        &mut alice,
        json!({"type": "OFFER", "callId": "c1", "to": "B", "payload": "sdp1"}),
    )
    .await;
    assert_eq!(
        recv_json(&mut bob).await,
        json!({"type": "OFFER", "callId": "c1", "from": "A", "to": "B", "payload": "sdp1"})
    );

    send_json(
        &mut bob,
        json!({"type": "ANSWER", "callId": "c1", "from": "B", "to": "A", "payload": "sdp2"}),
    )
    .await;
    assert_eq!(
        recv_json(&mut alice).await,
        json!({"type": "ANSWER", "callId": "c1", "from": "B", "to": "A", "payload": "sdp2"})
    );

    send_json(&mut alice, json!({"type": "LEAVE", "callId": "c1"})).await;
    eventually(|| participants(&server, "c1") == ids(&["B"])).await;
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_ice_payload_is_forwarded_verbatim() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    let candidate = json!({
        "candidate": "candidate:842163049 1 udp 1677729535 203.0.113.7 46154 typ srflx",
        "sdpMid": "0",
        "sdpMLineIndex": 0,
        "usernameFragment": null
    });
    send_json(&mut alice, json!({"type": "ICE", "to": "bob", "payload": candidate})).await;

    let received = recv_json(&mut bob).await;
    assert_eq!(received["payload"], candidate);
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_null_payload_is_kept_and_sender_stamped() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    send_json(&mut alice, json!({"type": "ICE", "to": "bob", "payload": null})).await;
    assert_eq!(
        recv_json(&mut bob).await,
        json!({"type": "ICE", "from": "alice", "to": "bob", "payload": null})
    );

    send_json(&mut alice, json!({"type": "ICE", "to": "bob"})).await;
    assert_eq!(
        recv_json(&mut bob).await,
        json!({"type": "ICE", "from": "alice", "to": "bob"})
    );
}

#[tokio::test]
async fn test_handshake_without_user_id_is_rejected() {
    let server = start_server(test_config()).await;

    for uri in ["/ws/signaling", "/ws/signaling?userId="] {
        let url = format!("ws://{}{}", server.addr, uri);
        let err = tokio_tungstenite::connect_async(url).await.unwrap_err();
        match err {
            WsError::Http(response) => assert_eq!(response.status(), 400),
            other => panic!("expected HTTP rejection, got {other:?}"),
        }
    }
    assert!(server.state.router().registry().is_empty());
}

#[tokio::test]
async fn test_unknown_path_is_rejected() {
    let server = start_server(test_config()).await;

    let url = format!("ws://{}/signal?userId=alice", server.addr);
    let err = tokio_tungstenite::connect_async(url).await.unwrap_err();
    match err {
        WsError::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
    assert!(server.state.router().registry().is_empty());
}

#[tokio::test]
async fn test_malformed_frames_do_not_end_session() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    send_raw(&mut alice, "this is not json").await;
    send_raw(&mut alice, r#"{"type":"HANGUP","callId":"c1"}"#).await;
    send_raw(&mut alice, r#"{"type":"OFFER","payload":"no recipient"}"#).await;
    send_json(&mut alice, json!({"type": "OFFER", "from": "mallory", "to": "bob"})).await;
    send_json(&mut alice, json!({"type": "OFFER", "to": "bob", "payload": "real"})).await;

    let received = recv_json(&mut bob).await;
    assert_eq!(received["payload"], "real");
    assert_eq!(received["from"], "alice");
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_forward_to_offline_user_is_dropped() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;

    send_json(&mut alice, json!({"type": "OFFER", "to": "nobody", "payload": "sdp"})).await;
    assert_silent(&mut alice).await;

    // The session is still usable afterwards.
    let mut bob = connect(&server, "bob").await;
    send_json(&mut alice, json!({"type": "OFFER", "to": "bob", "payload": "sdp"})).await;
    assert_eq!(recv_json(&mut bob).await["payload"], "sdp");
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_connection() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;
    let mut old_bob = connect(&server, "bob").await;
    let mut new_bob = connect(&server, "bob").await;

    // The superseded socket is closed by the relay.
    loop {
        match old_bob.next().await {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }
    assert_eq!(server.state.router().registry().len(), 2);

    send_json(&mut alice, json!({"type": "ICE", "to": "bob", "payload": "cand"})).await;
    assert_eq!(recv_json(&mut new_bob).await["payload"], "cand");
}

#[tokio::test]
async fn test_close_leaves_joined_rooms() {
    let server = start_server(test_config()).await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    send_json(&mut alice, json!({"type": "JOIN", "callId": "c1"})).await;
    eventually(|| participants(&server, "c1").len() == 1).await;
    send_json(&mut bob, json!({"type": "JOIN", "callId": "c1"})).await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    alice.close(None).await.unwrap();
    eventually(|| participants(&server, "c1") == ids(&["bob"])).await;
    assert!(
        server
            .state
            .router()
            .registry()
            .lookup(&Identity::from("alice"))
            .is_none()
    );

    // A fresh join brings the room back to two and fires READY again.
    let mut carol = connect(&server, "carol").await;
    send_json(&mut carol, json!({"type": "JOIN", "callId": "c1"})).await;
    let ready = json!({"type": "READY", "callId": "c1"});
    assert_eq!(recv_json(&mut bob).await, ready);
    assert_eq!(recv_json(&mut carol).await, ready);
}

#[tokio::test]
async fn test_close_keeps_rooms_when_configured() {
    let server = start_server(ServerConfig {
        leave_on_close: false,
        ..test_config()
    })
    .await;
    let mut alice = connect(&server, "alice").await;

    send_json(&mut alice, json!({"type": "JOIN", "callId": "c1"})).await;
    eventually(|| participants(&server, "c1").len() == 1).await;

    alice.close(None).await.unwrap();
    eventually(|| server.state.router().registry().is_empty()).await;
    assert_eq!(participants(&server, "c1"), ids(&["alice"]));
}

#[tokio::test]
async fn test_group_call_threshold() {
    let server = start_server(ServerConfig {
        ready_threshold: 3,
        ..test_config()
    })
    .await;
    let mut clients = Vec::new();
    for name in ["a", "b", "c"] {
        clients.push(connect(&server, name).await);
    }

    for (i, client) in clients.iter_mut().enumerate() {
        send_json(client, json!({"type": "JOIN", "callId": "room"})).await;
        eventually(|| participants(&server, "room").len() == i + 1).await;
    }

    let ready = json!({"type": "READY", "callId": "room"});
    for client in &mut clients {
        assert_eq!(recv_json(client).await, ready);
        assert_silent(client).await;
    }
}
