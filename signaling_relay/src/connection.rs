//! Connection handles held by the relay
//!
//! The routing engine never owns a socket. It holds a [`Connection`], a cheap
//! handle that can report liveness and queue an outbound text frame for the
//! task that owns the socket.

use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Unique id assigned to each accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-owning handle to one duplex channel to a remote endpoint
pub trait Connection: Clone + Send + Sync + 'static {
    /// Identity of this particular connection, distinct across reconnects
    fn id(&self) -> ConnectionId;

    /// Whether frames can still be delivered
    fn is_open(&self) -> bool;

    /// Remote address, for diagnostics only
    fn remote_addr(&self) -> String;

    /// Queue a text frame for delivery. Must not block.
    fn send(&self, frame: String) -> Result<(), SignalingError>;
}

/// Connection handle backed by a bounded channel to the socket's writer task
#[derive(Clone, Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    tx: mpsc::Sender<String>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::Sender<String>, remote_addr: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            tx,
        }
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.to_string()
    }

    fn send(&self, frame: String) -> Result<(), SignalingError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                SignalingError::SendError(format!("send queue full for {}", self.id))
            }
            TrySendError::Closed(_) => SignalingError::ConnectionClosed,
        })
    }
}
