//! WebSocket connection handler
//!
//! Each accepted TCP stream is upgraded on the configured path. The caller's
//! identity comes from the `userId` query parameter of the upgrade request;
//! requests without one are refused before anything is registered.

use crate::connection::{ChannelConnection, Connection};
use crate::error::SignalingError;
use crate::protocol::Identity;
use crate::state::ServerState;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRecv = SplitStream<WebSocketStream<TcpStream>>;

/// Query parameter carrying the caller's identity
pub const USER_ID_PARAM: &str = "userId";

/// Get query parameter from URI
fn get_query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let k = parts.next()?;
            let v = parts.next()?;
            if k == key { Some(v) } else { None }
        })
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Check an upgrade request and extract the declared identity
fn check_upgrade(request: &Request, path: &str) -> Result<String, ErrorResponse> {
    if request.uri().path() != path {
        return Err(reject(StatusCode::NOT_FOUND, "Not Found"));
    }
    match get_query_param(request.uri().query(), USER_ID_PARAM) {
        Some(user) if !user.is_empty() => Ok(user.to_string()),
        _ => Err(reject(
            StatusCode::BAD_REQUEST,
            "Missing userId query parameter",
        )),
    }
}

/// Serve one connection from handshake to close.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), SignalingError> {
    let config = state.config();
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_message_size))
        .max_frame_size(Some(config.max_message_size));

    let declared = Arc::new(OnceLock::new());
    let declared_cell = Arc::clone(&declared);
    let path = config.path.clone();
    let mut ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        move |request: &Request, response: Response| match check_upgrade(request, &path) {
            Ok(user) => {
                let _ = declared_cell.set(user);
                Ok(response)
            }
            Err(rejection) => {
                debug!(
                    %peer_addr,
                    uri = %request.uri(),
                    status = %rejection.status(),
                    "upgrade refused"
                );
                Err(rejection)
            }
        },
        Some(ws_config),
    )
    .await?;

    let (tx, mut outbound) = mpsc::channel(config.send_queue);
    let connection = ChannelConnection::new(tx, peer_addr);
    let conn_id = connection.id();
    let identity = match state
        .router()
        .connect(declared.get().map(String::as_str), connection)
    {
        Ok(identity) => identity,
        Err(e) => {
            let _ = ws_stream.close(None).await;
            return Err(e);
        }
    };

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let result =
        run_message_loop(&mut ws_tx, &mut ws_rx, &mut outbound, &state, &identity).await;

    outbound.close();
    state.router().disconnect(&identity, conn_id);
    let _ = ws_tx.close().await;

    if let Err(ref e) = result {
        debug!(
            user = %identity,
            connection = %conn_id,
            error = %e,
            "connection ended with error"
        );
    }
    result
}

/// Relay frames until either side closes.
///
/// Inbound frames are dispatched one at a time so a connection's messages
/// are routed in the order they arrived.
async fn run_message_loop(
    ws_tx: &mut WsSink,
    ws_rx: &mut WsRecv,
    outbound: &mut mpsc::Receiver<String>,
    state: &ServerState,
    identity: &Identity,
) -> Result<(), SignalingError> {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = state.router().handle_frame(identity, text.as_str()) {
                            warn!(user = %identity, error = %e, "dropping frame");
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(user = %identity, "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(SignalingError::WebSocket(e)),
                }
            }
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => ws_tx.send(Message::text(frame)).await?,
                    None => {
                        // Every sender is gone: a newer connection took over this identity.
                        info!(user = %identity, "superseded by a newer connection, closing");
                        return Ok(());
                    }
                }
            }
        }
    }
}
