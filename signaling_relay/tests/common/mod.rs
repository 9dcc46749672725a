#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use signaling_relay::{ServerConfig, ServerState, run_with_shutdown};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: ServerState,
    _shutdown: watch::Sender<()>,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    }
}

pub async fn start_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind(config.listen).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ServerState::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(run_with_shutdown(listener, state.clone(), shutdown_rx));
    TestServer {
        addr,
        state,
        _shutdown: shutdown_tx,
    }
}

pub fn url(addr: &SocketAddr, user: &str) -> String {
    format!("ws://{addr}/ws/signaling?userId={user}")
}

/// Connect as `user` and wait until the relay has registered the connection.
pub async fn connect(server: &TestServer, user: &str) -> Client {
    let before = registered_connection(server, user);
    let (ws, _) = tokio_tungstenite::connect_async(url(&server.addr, user))
        .await
        .unwrap();
    eventually(|| {
        let current = registered_connection(server, user);
        current.is_some() && current != before
    })
    .await;
    ws
}

fn registered_connection(server: &TestServer, user: &str) -> Option<signaling_relay::ConnectionId> {
    use signaling_relay::{Connection, Identity, IdentityRegistry};
    server
        .state
        .router()
        .registry()
        .lookup(&Identity::from(user))
        .map(|conn| conn.id())
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .unwrap();
}

pub async fn send_raw(client: &mut Client, text: &str) {
    client.send(Message::text(text.to_string())).await.unwrap();
}

/// Next text frame, parsed as JSON.
pub async fn recv_json(client: &mut Client) -> Value {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Assert no text frame arrives within a short window.
pub async fn assert_silent(client: &mut Client) {
    let window = Duration::from_millis(200);
    loop {
        match tokio::time::timeout(window, client.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {text}"),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("connection ended: {other:?}"),
        }
    }
}

/// Poll `condition` until it holds, failing after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}
