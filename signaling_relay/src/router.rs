//! Routing engine
//!
//! Consumes connection lifecycle events and decoded signals, consults the
//! [`IdentityRegistry`] and [`RoomTable`], and decides which connection (if
//! any) each frame goes to. The router holds no state of its own beyond
//! those two stores, so it is safe to call from every connection task at
//! once.

use crate::connection::{Connection, ConnectionId};
use crate::error::{ClientRequestError, SignalingError};
use crate::protocol::{CallId, Identity, ServerEvent, SignalMessage, SignalType};
use crate::registry::{IdentityRegistry, InMemoryRegistry};
use crate::rooms::{InMemoryRoomTable, RoomTable};
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::{debug, info, warn};

/// Routing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Participant count at which every participant is sent READY
    pub ready_threshold: usize,
    /// Leave every joined room when a connection closes
    pub leave_on_close: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ready_threshold: 2,
            leave_on_close: true,
        }
    }
}

/// The routing engine
pub struct Router<C, R = InMemoryRegistry<C>, T = InMemoryRoomTable> {
    registry: R,
    rooms: T,
    config: RouterConfig,
    _connection: PhantomData<fn() -> C>,
}

impl<C: Connection> Router<C> {
    /// Router over fresh in-memory stores
    pub fn new(config: RouterConfig) -> Self {
        Self::with_stores(InMemoryRegistry::new(), InMemoryRoomTable::new(), config)
    }
}

impl<C, R, T> Router<C, R, T>
where
    C: Connection,
    R: IdentityRegistry<C>,
    T: RoomTable,
{
    pub fn with_stores(registry: R, rooms: T, config: RouterConfig) -> Self {
        Self {
            registry,
            rooms,
            config,
            _connection: PhantomData,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn rooms(&self) -> &T {
        &self.rooms
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// A connection finished its handshake declaring `identity`.
    ///
    /// Fails closed on an absent or empty identity; nothing is registered.
    pub fn connect(
        &self,
        identity: Option<&str>,
        connection: C,
    ) -> Result<Identity, SignalingError> {
        let identity = match identity {
            Some(id) if !id.is_empty() => Identity::from(id),
            _ => return Err(SignalingError::MissingIdentity),
        };

        let conn_id = connection.id();
        let remote = connection.remote_addr();
        if let Some(previous) = self.registry.register(identity.clone(), connection) {
            info!(
                user = %identity,
                connection = %conn_id,
                superseded = %previous.id(),
                "connection superseded existing registration"
            );
        }
        info!(user = %identity, connection = %conn_id, %remote, "connected");
        Ok(identity)
    }

    /// Decode a text frame from `sender` and dispatch it.
    pub fn handle_frame(
        &self,
        sender: &Identity,
        frame: &str,
    ) -> Result<(), ClientRequestError> {
        let signal: SignalMessage = frame.parse()?;
        self.dispatch(sender, signal)
    }

    /// Dispatch a decoded signal sent by `sender`.
    ///
    /// `from` is stamped with the sender's identity. A message claiming to be
    /// from somebody else is rejected.
    pub fn dispatch(
        &self,
        sender: &Identity,
        mut signal: SignalMessage,
    ) -> Result<(), ClientRequestError> {
        if let Some(from) = signal.from.as_ref().filter(|from| !from.is_empty()) {
            if from != sender {
                return Err(ClientRequestError::SenderMismatch {
                    claimed: from.to_string(),
                    actual: sender.to_string(),
                });
            }
        }
        signal.from = Some(sender.clone());

        match signal.kind {
            SignalType::Join => {
                let call_id = signal.require_call_id()?;
                self.join(call_id, sender);
            }
            SignalType::Offer | SignalType::Answer | SignalType::Ice => {
                self.forward(&signal)?;
            }
            SignalType::Leave => {
                let call_id = signal.require_call_id()?;
                let removed = self.rooms.leave(call_id, sender);
                debug!(user = %sender, call = %call_id, removed, "leave");
            }
        }
        Ok(())
    }

    /// The connection `connection` for `identity` has closed.
    ///
    /// A close from a connection that has since been superseded leaves the
    /// newer registration (and its room memberships) untouched. Rooms are only
    /// left while the identity is still unregistered, checked under the room
    /// table's lock, so a reconnect that joins in the meantime keeps its
    /// membership.
    pub fn disconnect(&self, identity: &Identity, connection: ConnectionId) {
        if !self.registry.unregister_if(identity, connection) {
            debug!(user = %identity, %connection, "stale connection closed");
            return;
        }
        info!(user = %identity, %connection, "disconnected");

        if self.config.leave_on_close {
            let left = self
                .rooms
                .leave_all_if(identity, || self.registry.lookup(identity).is_none());
            if !left.is_empty() {
                debug!(user = %identity, rooms = ?left, "left rooms on close");
            }
        }
    }

    fn join(&self, call_id: &CallId, identity: &Identity) {
        let outcome = self.rooms.join(call_id, identity);
        debug!(
            user = %identity,
            call = %call_id,
            participants = outcome.participants,
            inserted = outcome.inserted,
            "join"
        );

        if outcome.inserted && outcome.participants == self.config.ready_threshold {
            self.broadcast_ready(call_id, &outcome.members);
        }
    }

    /// Send READY to the members seen by the join that filled the room.
    fn broadcast_ready(&self, call_id: &CallId, participants: &HashSet<Identity>) {
        let event = ServerEvent::Ready {
            call_id: call_id.clone(),
        };
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(call = %call_id, error = %e, "failed to encode READY");
                return;
            }
        };

        let delivered = participants
            .iter()
            .filter(|participant| self.deliver(participant, frame.clone()))
            .count();
        info!(
            call = %call_id,
            participants = participants.len(),
            delivered,
            "call ready"
        );
    }

    fn forward(&self, signal: &SignalMessage) -> Result<(), ClientRequestError> {
        let to = signal.require_to()?;
        let frame = signal.to_frame()?;
        if self.deliver(to, frame) {
            debug!(kind = %signal.kind, %to, "forwarded");
        }
        Ok(())
    }

    /// Send `frame` to whoever is registered as `recipient`.
    ///
    /// Unreachable recipients and failed sends are dropped.
    fn deliver(&self, recipient: &Identity, frame: String) -> bool {
        let Some(connection) = self.registry.lookup(recipient) else {
            debug!(to = %recipient, "recipient not connected, dropping");
            return false;
        };
        if !connection.is_open() {
            debug!(
                to = %recipient,
                connection = %connection.id(),
                "recipient connection closed, dropping"
            );
            return false;
        }
        match connection.send(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    to = %recipient,
                    connection = %connection.id(),
                    error = %e,
                    "send failed, dropping"
                );
                false
            }
        }
    }
}
