//! Error types for the room layer.

use prsi_game::GameError;
use prsi_protocol::{PlayerId, RoomId, RoomState};

/// Errors that can occur during room and lobby operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room has no free seat.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The lobby already holds its maximum number of rooms.
    #[error("lobby is full ({0} rooms)")]
    LobbyFull(usize),

    /// The player is already seated in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not seated in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The room's state does not allow the operation, e.g. joining a
    /// room that is already Playing.
    #[error("room {room} is {state}")]
    InvalidState { room: RoomId, state: RoomState },

    /// The rules engine refused to set up the game.
    #[error(transparent)]
    Game(#[from] GameError),
}
