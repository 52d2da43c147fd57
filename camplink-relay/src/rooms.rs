//! Room membership table for the relay server.
//!
//! One mapping from room name to the set of joined connections, with a
//! reverse index from connection to the rooms it has joined. The two sides
//! are always updated together so a connection never lingers in a room it
//! has left. Rooms are implicit: an entry exists only while it has members.
//!
//! The table is plain data; [`crate::relay::RelayState`] owns it behind its
//! lock.

use std::collections::{HashMap, HashSet};

use camplink_proto::room::{ConnectionId, RoomName};

/// Room name → members, plus connection → joined rooms.
#[derive(Debug, Default)]
pub struct RoomTable {
    members: HashMap<RoomName, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<RoomName>>,
}

impl RoomTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to `room`, creating the room if needed.
    ///
    /// Returns `false` if `conn` was already a member.
    pub fn join(&mut self, conn: ConnectionId, room: &RoomName) -> bool {
        let added = self.members.entry(room.clone()).or_default().insert(conn);
        if added {
            self.joined.entry(conn).or_default().insert(room.clone());
        }
        added
    }

    /// Removes `conn` from `room`, dropping the room once empty.
    ///
    /// Returns `false` if `conn` was not a member.
    pub fn leave(&mut self, conn: ConnectionId, room: &RoomName) -> bool {
        let removed = remove_member(&mut self.members, room, conn);
        if removed && let Some(rooms) = self.joined.get_mut(&conn) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.joined.remove(&conn);
            }
        }
        removed
    }

    /// Removes `conn` from every room it belongs to, returning those rooms.
    pub fn leave_all(&mut self, conn: ConnectionId) -> Vec<RoomName> {
        let Some(rooms) = self.joined.remove(&conn) else {
            return Vec::new();
        };
        for room in &rooms {
            remove_member(&mut self.members, room, conn);
        }
        rooms.into_iter().collect()
    }

    /// Current members of `room` (empty for unknown rooms).
    #[must_use]
    pub fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.members
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms `conn` has joined.
    #[must_use]
    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<RoomName> {
        self.joined
            .get(&conn)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `conn` is currently in `room`.
    #[must_use]
    pub fn is_member(&self, conn: ConnectionId, room: &RoomName) -> bool {
        self.members.get(room).is_some_and(|m| m.contains(&conn))
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.members.len()
    }
}

fn remove_member(
    members: &mut HashMap<RoomName, HashSet<ConnectionId>>,
    room: &RoomName,
    conn: ConnectionId,
) -> bool {
    let Some(set) = members.get_mut(room) else {
        return false;
    };
    let removed = set.remove(&conn);
    if set.is_empty() {
        members.remove(room);
    }
    removed
}
