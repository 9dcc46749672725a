//! Room table: which identities are in which call

use crate::protocol::{CallId, Identity};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of a single atomic join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Participant count after the join
    pub participants: usize,
    /// `false` if the identity was already in the room
    pub inserted: bool,
    /// The room's members as of this join, taken under the same lock
    pub members: HashSet<Identity>,
}

/// Maps call ids to their participants
pub trait RoomTable: Send + Sync {
    /// Add `identity` to the room and measure it, as one atomic step.
    fn join(&self, call_id: &CallId, identity: &Identity) -> JoinOutcome;

    /// Remove `identity` from the room. Returns `true` if it was present.
    fn leave(&self, call_id: &CallId, identity: &Identity) -> bool;

    /// Snapshot of the room's participants
    fn participants_of(&self, call_id: &CallId) -> HashSet<Identity>;

    /// Snapshot of the rooms `identity` is in
    fn rooms_of(&self, identity: &Identity) -> HashSet<CallId>;

    /// Remove `identity` from every room, returning the rooms it left.
    fn leave_all(&self, identity: &Identity) -> Vec<CallId>;

    /// Like [`RoomTable::leave_all`], but only if `condition` still holds
    /// once the table is locked.
    ///
    /// A join that lands after the check sees the identity already gone and
    /// inserts it afresh.
    fn leave_all_if(&self, identity: &Identity, condition: impl Fn() -> bool) -> Vec<CallId>;
}

#[derive(Debug, Default)]
struct Rooms {
    /// call -> participants
    participants: HashMap<CallId, HashSet<Identity>>,
    /// identity -> calls, kept in lockstep with `participants`
    memberships: HashMap<Identity, HashSet<CallId>>,
}

impl Rooms {
    fn remove_all(&mut self, identity: &Identity) -> Vec<CallId> {
        let calls: Vec<CallId> = self
            .memberships
            .get(identity)
            .map(|calls| calls.iter().cloned().collect())
            .unwrap_or_default();
        for call_id in &calls {
            self.remove(call_id, identity);
        }
        calls
    }

    fn remove(&mut self, call_id: &CallId, identity: &Identity) -> bool {
        let Some(members) = self.participants.get_mut(call_id) else {
            return false;
        };
        let removed = members.remove(identity);
        if members.is_empty() {
            self.participants.remove(call_id);
        }
        if removed {
            if let Some(calls) = self.memberships.get_mut(identity) {
                calls.remove(call_id);
                if calls.is_empty() {
                    self.memberships.remove(identity);
                }
            }
        }
        removed
    }
}

/// In-process room table guarded by a single lock
///
/// Empty rooms are dropped as soon as their last participant leaves.
#[derive(Debug, Default)]
pub struct InMemoryRoomTable {
    inner: Mutex<Rooms>,
}

impl InMemoryRoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty rooms
    pub fn room_count(&self) -> usize {
        self.lock().participants.len()
    }

    fn lock(&self) -> MutexGuard<'_, Rooms> {
        // No method can panic between the paired map updates.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoomTable for InMemoryRoomTable {
    fn join(&self, call_id: &CallId, identity: &Identity) -> JoinOutcome {
        let mut rooms = self.lock();
        let members = rooms.participants.entry(call_id.clone()).or_default();
        let inserted = members.insert(identity.clone());
        let participants = members.len();
        let members = members.clone();
        if inserted {
            rooms
                .memberships
                .entry(identity.clone())
                .or_default()
                .insert(call_id.clone());
        }
        JoinOutcome {
            participants,
            inserted,
            members,
        }
    }

    fn leave(&self, call_id: &CallId, identity: &Identity) -> bool {
        self.lock().remove(call_id, identity)
    }

    fn participants_of(&self, call_id: &CallId) -> HashSet<Identity> {
        self.lock()
            .participants
            .get(call_id)
            .cloned()
            .unwrap_or_default()
    }

    fn rooms_of(&self, identity: &Identity) -> HashSet<CallId> {
        self.lock()
            .memberships
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    fn leave_all(&self, identity: &Identity) -> Vec<CallId> {
        self.lock().remove_all(identity)
    }

    fn leave_all_if(&self, identity: &Identity, condition: impl Fn() -> bool) -> Vec<CallId> {
        let mut rooms = self.lock();
        if !condition() {
            return Vec::new();
        }
        rooms.remove_all(identity)
    }
}
