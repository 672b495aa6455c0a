//! Room Registry
//!
//! Owns the room-id → room map. Rooms are created lazily on first join (or
//! explicitly by the room-creation endpoint) and reclaimed as soon as their
//! member set empties; nothing survives a restart.
//!
//! Locking discipline: the registry lock guards the map, each room carries
//! its own state lock, and the order is always registry → room. Membership
//! edits run inside the registry lock so a join can never observe a room
//! being reclaimed out from under it; playback commands take only their
//! room's lock and so never contend across rooms.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::room::code::RoomCode;
use crate::room::state::RoomState;

/// A registered room: shared handle plus the per-room mutation lock.
#[derive(Debug)]
pub struct Room {
    state: Mutex<RoomState>,
}

impl Room {
    fn new(room_id: &str, now_ms: u64) -> Self {
        Self {
            state: Mutex::new(RoomState::new(room_id, now_ms)),
        }
    }

    /// Run one serialized mutation (or read) against the room state.
    ///
    /// The guard is never held across an await; outbound delivery is a
    /// non-blocking channel send, so command application and broadcast
    /// enqueue form a single atomic section.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut RoomState) -> T) -> T {
        f(&mut self.state.lock())
    }
}

/// Process-wide table of live rooms.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    clock: Arc<dyn Clock>,
}

impl RoomRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Return the room for `room_id`, creating a fresh one if unknown.
    /// At most one room per id exists under concurrent calls.
    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.lock();
        Self::get_or_create_locked(&mut rooms, room_id, self.clock.now_ms())
    }

    fn get_or_create_locked(
        rooms: &mut HashMap<String, Arc<Room>>,
        room_id: &str,
        now_ms: u64,
    ) -> Arc<Room> {
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, "creating room");
                Arc::new(Room::new(room_id, now_ms))
            })
            .clone()
    }

    /// Allocate a fresh room with a server-generated id (room-creation
    /// endpoint). Retries on the off chance of a code collision.
    pub fn create_room(&self) -> String {
        let mut rooms = self.rooms.lock();
        let now_ms = self.clock.now_ms();
        loop {
            let code = RoomCode::random().into_string();
            if rooms.contains_key(&code) {
                continue;
            }
            info!(room_id = %code, "allocated room");
            rooms.insert(code.clone(), Arc::new(Room::new(&code, now_ms)));
            return code;
        }
    }

    /// Resolve (creating if needed) and mutate a room in one step, with
    /// reclamation excluded for the duration. Used for joins.
    pub fn with_room<T>(&self, room_id: &str, f: impl FnOnce(&mut RoomState) -> T) -> (Arc<Room>, T) {
        let mut rooms = self.rooms.lock();
        let room = Self::get_or_create_locked(&mut rooms, room_id, self.clock.now_ms());
        let out = room.with_state(f);
        (room, out)
    }

    /// Mutate an existing room, then reclaim it if its member set emptied.
    /// Used for leaves/disconnects; returns `None` if the room is unknown.
    pub fn with_existing<T>(
        &self,
        room_id: &str,
        f: impl FnOnce(&mut RoomState) -> T,
    ) -> Option<T> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get(room_id)?.clone();
        let out = room.with_state(f);
        if room.with_state(|state| state.is_empty()) {
            rooms.remove(room_id);
            debug!(room_id, "reclaimed empty room");
        }
        Some(out)
    }

    /// Drop the room if its member set is empty.
    pub fn remove_if_empty(&self, room_id: &str) {
        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get(room_id) {
            if room.with_state(|state| state.is_empty()) {
                rooms.remove(room_id);
                debug!(room_id, "reclaimed empty room");
            }
        }
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }
}
