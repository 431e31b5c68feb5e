//! The lobby: every room on the server, keyed by id.

use std::collections::BTreeMap;

use prsi_protocol::{RoomId, RoomSummary};

use crate::{Room, RoomConfig, RoomError};

/// Registry of rooms.
///
/// Room ids are the smallest non-negative integers not in use, so an id
/// freed by a closed room is handed out again by the next
/// [`create_room`](Lobby::create_room).
#[derive(Debug)]
pub struct Lobby {
    rooms: BTreeMap<RoomId, Room>,
    max_rooms: usize,
    room_config: RoomConfig,
}

impl Lobby {
    pub fn new(max_rooms: usize, room_config: RoomConfig) -> Self {
        Self {
            rooms: BTreeMap::new(),
            max_rooms,
            room_config,
        }
    }

    /// Creates an empty Waiting room and returns its id.
    ///
    /// # Errors
    /// [`RoomError::LobbyFull`] when `max_rooms` rooms already exist.
    pub fn create_room(&mut self) -> Result<RoomId, RoomError> {
        if self.rooms.len() >= self.max_rooms {
            return Err(RoomError::LobbyFull(self.max_rooms));
        }
        let id = self.free_id();
        self.rooms.insert(id, Room::new(id, self.room_config));
        tracing::info!(room_id = %id, rooms = self.rooms.len(), "room created");
        Ok(id)
    }

    /// Removes a room. Does nothing if it does not exist.
    pub fn remove_room(&mut self, id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&id)?;
        tracing::info!(room_id = %id, rooms = self.rooms.len(), "room removed");
        Some(room)
    }

    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn get_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    /// Like [`get_mut`](Lobby::get_mut) but with an error for the caller
    /// to propagate.
    pub fn room_mut(&mut self, id: RoomId) -> Result<&mut Room, RoomError> {
        self.rooms.get_mut(&id).ok_or(RoomError::NotFound(id))
    }

    /// All rooms in id order, as listed by `ROOMS`.
    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms.values().map(Room::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Smallest id not taken. Keys are sorted, so the first gap wins.
    fn free_id(&self) -> RoomId {
        let mut candidate = 0;
        for id in self.rooms.keys() {
            if id.0 != candidate {
                break;
            }
            candidate += 1;
        }
        RoomId(candidate)
    }
}
