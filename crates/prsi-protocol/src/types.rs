//! Core protocol types: identities, room states, and the two message
//! directions.
//!
//! Every value that ends up as a token on the wire is defined here, so
//! the codec can render it without depending on the room or game crates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Card;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a named player.
///
/// A player id is handed out when a connection registers its nickname and
/// survives a reconnect, so it is distinct from the transport's
/// connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// `tracing::info!(%player_id, ...)` prints "P-42".
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a room. Ids are small and reused: the lobby always hands
/// out the smallest one not currently taken. On the wire it is the bare
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// - **Waiting**: accepting joins until the room is full.
/// - **Playing**: a game is running; nobody can join.
/// - **Finished**: the game is over; players linger until they leave.
///
/// `Display` renders the wire token (`WAITING`, `PLAYING`, `FINISHED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Waiting,
    Playing,
    Finished,
}

impl RoomState {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while a game is being played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// The only state this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage (client → server)
// ---------------------------------------------------------------------------

/// Everything a client may send. One variant per verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `PONG`: answer to a ping; only its arrival matters.
    Pong,
    /// `NAME <nick>`: register (or reclaim) a nickname.
    Name(String),
    /// `LIST_ROOMS`
    ListRooms,
    /// `JOIN_ROOM <id>`
    JoinRoom(RoomId),
    /// `CREATE_ROOM`
    CreateRoom,
    /// `LEAVE_ROOM`
    LeaveRoom,
    /// `ROOM_INFO`
    RoomInfo,
    /// `STATE`: ask for a full snapshot of where the client stands.
    State,
    /// `PLAY <card>`
    Play(Card),
    /// `DRAW`
    Draw,
    /// `PASS`: accept a pending Ace skip or Seven penalty.
    Pass,
    /// `OK ...`: informational acknowledgement, ignored.
    Ok,
}

impl ClientMessage {
    /// The wire verb this message was decoded from.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Pong => "PONG",
            Self::Name(_) => "NAME",
            Self::ListRooms => "LIST_ROOMS",
            Self::JoinRoom(_) => "JOIN_ROOM",
            Self::CreateRoom => "CREATE_ROOM",
            Self::LeaveRoom => "LEAVE_ROOM",
            Self::RoomInfo => "ROOM_INFO",
            Self::State => "STATE",
            Self::Play(_) => "PLAY",
            Self::Draw => "DRAW",
            Self::Pass => "PASS",
            Self::Ok => "OK",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage (server → client)
// ---------------------------------------------------------------------------

/// The command an `OK` or `FAIL` reply refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Name,
    JoinRoom,
    CreateRoom,
    LeaveRoom,
    Play,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Name => "NAME",
            Self::JoinRoom => "JOIN_ROOM",
            Self::CreateRoom => "CREATE_ROOM",
            Self::LeaveRoom => "LEAVE_ROOM",
            Self::Play => "PLAY",
        };
        f.write_str(verb)
    }
}

/// One entry of a `ROOMS` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub state: RoomState,
}

/// A seated player as shown in `ROOM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub nickname: String,
    pub awake: bool,
}

/// Body of a `ROOM` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub id: RoomId,
    pub state: RoomState,
    /// In seating order.
    pub players: Vec<PlayerView>,
}

/// Body of a `TURN` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub nickname: String,
    pub top: Card,
}

/// Body of a `STATE` reply, one variant per client location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateView {
    Unnamed,
    Lobby,
    Room(RoomView),
    Game {
        room: RoomView,
        hand: Vec<Card>,
        /// `None` once the game has finished.
        turn: Option<TurnView>,
    },
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Ping,
    Ok(Command),
    Fail(Command),
    Rooms(Vec<RoomSummary>),
    Room(RoomView),
    Join(String),
    Leave(String),
    GameStart,
    Hand(Vec<Card>),
    Turn(TurnView),
    Played { nickname: String, card: Card },
    Skip(String),
    Drawed { nickname: String, count: usize },
    Cards(Vec<Card>),
    Win,
    Lose,
    /// Finishing order first, then anyone who still held cards.
    Leaderboard(Vec<String>),
    Sleep(String),
    Awake(String),
    Dead(String),
    State(StateView),
}

// =========================================================================
// Tests
// =========================================================================
