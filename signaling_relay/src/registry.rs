//! Identity registry: which connection currently speaks for each identity

use crate::connection::{Connection, ConnectionId};
use crate::protocol::Identity;
use dashmap::DashMap;

/// Maps identities to their currently active connection
///
/// Every operation is atomic with respect to the others.
pub trait IdentityRegistry<C: Connection>: Send + Sync {
    /// Associate `identity` with `connection`, returning the handle it replaced.
    fn register(&self, identity: Identity, connection: C) -> Option<C>;

    /// The current handle for `identity`, if any.
    fn lookup(&self, identity: &Identity) -> Option<C>;

    /// Remove `identity` regardless of which connection it points at.
    fn unregister(&self, identity: &Identity) -> Option<C>;

    /// Remove `identity` only if it still points at `connection`.
    ///
    /// Returns `true` if an entry was removed.
    fn unregister_if(&self, identity: &Identity, connection: ConnectionId) -> bool;

    /// Number of registered identities
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process registry backed by a sharded concurrent map
#[derive(Debug)]
pub struct InMemoryRegistry<C> {
    connections: DashMap<Identity, C>,
}

impl<C> InMemoryRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }
}

impl<C> Default for InMemoryRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> IdentityRegistry<C> for InMemoryRegistry<C> {
    fn register(&self, identity: Identity, connection: C) -> Option<C> {
        self.connections.insert(identity, connection)
    }

    fn lookup(&self, identity: &Identity) -> Option<C> {
        self.connections
            .get(identity)
            .map(|entry| entry.value().clone())
    }

    fn unregister(&self, identity: &Identity) -> Option<C> {
        self.connections.remove(identity).map(|(_, conn)| conn)
    }

    fn unregister_if(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.connections
            .remove_if(identity, |_, current| current.id() == connection)
            .is_some()
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}
