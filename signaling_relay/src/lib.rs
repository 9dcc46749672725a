//! WebSocket signaling relay for WebRTC calls
//!
//! The relay carries no media. It only moves the handshake metadata two
//! endpoints need to set up a direct connection: session description offers
//! and answers, and connectivity candidates.
//!
//! # Protocol
//!
//! Clients connect with a WebSocket upgrade on the configured path, naming
//! themselves in the query string:
//!
//! - **GET /ws/signaling?userId={id}** - Upgrade and register as `{id}`
//!
//! A second connection with the same `userId` replaces the first.
//!
//! ## Client messages
//!
//! JSON text frames:
//! - `{"type": "JOIN", "callId": "c1"}` - Enter call room `c1`
//! - `{"type": "OFFER", "to": "bob", "payload": ...}` - Forwarded to `bob`
//! - `{"type": "ANSWER", "to": "alice", "payload": ...}` - Forwarded to `alice`
//! - `{"type": "ICE", "to": "bob", "payload": ...}` - Forwarded to `bob`
//! - `{"type": "LEAVE", "callId": "c1"}` - Leave call room `c1`
//!
//! The relay stamps `from` with the sender's identity, so every forwarded
//! message carries it even when the sender left it out. A frame naming
//! someone else in `from` is dropped. Apart from that, forwarded messages
//! arrive unchanged: `payload` is passed through untouched, an explicit
//! `"payload": null` included.
//!
//! ## Server messages
//!
//! - `{"type": "READY", "callId": "c1"}` - Sent to every participant once
//!   the room reaches the ready threshold (2 by default)
//!
//! Malformed frames, unknown types and messages to offline users are
//! dropped without a reply.
//!
//! # Example
//!
//! ```bash
//! # Start the relay
//! signaling-relay --listen 127.0.0.1:8080
//!
//! # Connect as alice and join a call
//! websocat "ws://127.0.0.1:8080/ws/signaling?userId=alice"
//! {"type":"JOIN","callId":"c1"}
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod server;
pub mod state;

pub use config::{Args, ServerConfig};
pub use connection::{ChannelConnection, Connection, ConnectionId};
pub use error::{ClientRequestError, SignalingError};
pub use protocol::{CallId, Identity, ServerEvent, SignalMessage, SignalType};
pub use registry::{IdentityRegistry, InMemoryRegistry};
pub use rooms::{InMemoryRoomTable, JoinOutcome, RoomTable};
pub use router::{Router, RouterConfig};
pub use server::{run, run_with_shutdown};
pub use state::{ServerState, SignalRouter};
