//! Everything the server knows, minus the sockets.
//!
//! [`ServerState`] owns the sessions and the lobby. The reactor loop feeds
//! it readiness (through any [`Connection`]) and the current time, and
//! reads back which connections must be closed and which want to write.
//! Because no socket lives in here, the whole protocol can be driven from
//! tests with in-memory connections and a fake clock.
//!
//! ```text
//! Reactor ──readiness──→ ServerState ──frames──→ handlers
//!    ↑                        │
//!    └── closed ids, write ───┘
//!        interest
//! ```

mod handlers;

use std::fmt;
use std::time::Instant;

use prsi_protocol::{
    PlayerId, PlayerView, RoomId, RoomState, RoomView, ServerMessage, TurnView,
};
use prsi_room::{Departure, Lobby};
use prsi_session::{LivenessEvent, Location, Session, SessionError, SessionManager, SweepEvent};
use prsi_transport::{Connection, ConnectionId};
use rand::rngs::StdRng;

use crate::{PrsiError, ServerConfig};

/// A named session as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Actor {
    pub(crate) player: PlayerId,
    pub(crate) nickname: String,
    pub(crate) location: Location,
}

/// How a game came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    /// Someone emptied their hand and at most one card holder is left.
    Played,
    /// Departures left at most one card holder.
    Forfeit,
}

// ---------------------------------------------------------------------------
// ServerState
// ---------------------------------------------------------------------------

/// The authoritative game-session core.
pub struct ServerState {
    config: ServerConfig,
    sessions: SessionManager,
    lobby: Lobby,
    next_player: u64,
    rng: StdRng,
    /// Connections to close at the end of this loop iteration.
    closed: Vec<ConnectionId>,
}

impl ServerState {
    /// Creates an empty server. `rng` shuffles every deck.
    pub fn new(config: ServerConfig, rng: StdRng) -> Self {
        Self {
            sessions: SessionManager::new(config.session()),
            lobby: Lobby::new(config.max_rooms, config.room()),
            next_player: 1,
            rng,
            closed: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    #[cfg(test)]
    pub(crate) fn lobby_mut(&mut self) -> &mut Lobby {
        &mut self.lobby
    }

    // -- Connection lifecycle ----------------------------------------------

    /// Registers a freshly accepted connection as an Unnamed session.
    ///
    /// Returns `false` (and schedules the connection for closing) when the
    /// client limit is already reached.
    pub fn accept(&mut self, id: ConnectionId, now: Instant) -> bool {
        if self.sessions.len() >= self.config.max_clients {
            tracing::warn!(
                connection_id = %id,
                max_clients = self.config.max_clients,
                "client limit reached, refusing connection"
            );
            self.closed.push(id);
            return false;
        }
        self.sessions.open(id, now);
        tracing::info!(connection_id = %id, clients = self.sessions.len(), "client connected");
        true
    }

    /// Reads everything the connection has and runs every complete frame.
    pub fn on_readable(&mut self, conn: &impl Connection, now: Instant) {
        let id = conn.id();
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };

        let traffic = match session.on_readable(conn, now) {
            Ok(traffic) => traffic,
            Err(e) => return self.fail(id, e.into()),
        };
        tracing::trace!(connection_id = %id, bytes = traffic.bytes, "read");
        if traffic.woke {
            self.announce_wake(id);
        }

        let frames = match self.sessions.get_mut(id).map(Session::pop_frames) {
            Some(Ok(frames)) => frames,
            Some(Err(e)) => return self.fail(id, e.into()),
            None => return,
        };
        for tokens in frames {
            if let Err(e) = self.dispatch(id, &tokens) {
                return self.fail(id, e);
            }
        }
    }

    /// Flushes as much queued output as the connection accepts.
    pub fn on_writable(&mut self, conn: &impl Connection) {
        let id = conn.id();
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        if let Err(e) = session.on_writable(conn) {
            self.fail(id, e.into());
        }
    }

    /// Sends due pings and acts on liveness transitions.
    ///
    /// Sleepers are announced to their room once per nap; dead sessions are
    /// terminated.
    pub fn sweep(&mut self, now: Instant) {
        for SweepEvent { connection, event } in self.sessions.sweep(now) {
            match event {
                LivenessEvent::FellAsleep => {
                    if let Some((actor, room)) = self.seated(connection) {
                        self.broadcast(room, &ServerMessage::Sleep(actor.nickname), Some(actor.player));
                    }
                }
                LivenessEvent::Died => self.terminate_session(connection, "liveness timeout"),
            }
        }
    }

    /// Removes a session for good.
    ///
    /// If it sat in a room, the room hears `DEAD <nick>` first and then the
    /// ordinary consequences of a departure. The connection is scheduled for
    /// closing either way.
    pub fn terminate_session(&mut self, id: ConnectionId, reason: impl fmt::Display) {
        if let Some((actor, room)) = self.seated(id) {
            self.broadcast(room, &ServerMessage::Dead(actor.nickname.clone()), Some(actor.player));
            if let Err(e) = self.depart(&actor, room) {
                tracing::error!(connection_id = %id, room_id = %room, error = %e, "departure failed");
            }
        }
        if let Some(session) = self.sessions.close(id) {
            tracing::info!(
                connection_id = %id,
                nickname = session.nickname().unwrap_or("-"),
                %reason,
                "session terminated"
            );
        }
        self.closed.push(id);
    }

    /// Connections that must be deregistered and closed.
    pub fn take_closed(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.closed)
    }

    /// Whether each live session currently has output waiting.
    pub fn write_interest(&self) -> impl Iterator<Item = (ConnectionId, bool)> + '_ {
        self.sessions.iter().map(|s| (s.id(), s.wants_write()))
    }

    fn fail(&mut self, id: ConnectionId, error: PrsiError) {
        match &error {
            PrsiError::Session(SessionError::PeerClosed) => {
                tracing::info!(connection_id = %id, "peer closed the connection");
            }
            _ => tracing::warn!(connection_id = %id, %error, "dropping misbehaving session"),
        }
        self.terminate_session(id, error);
    }

    // -- Lookups -------------------------------------------------------------

    fn session(&self, id: ConnectionId) -> Result<&Session, PrsiError> {
        self.sessions
            .get(id)
            .ok_or_else(|| PrsiError::Internal(format!("no session for {id}")))
    }

    fn session_mut(&mut self, id: ConnectionId) -> Result<&mut Session, PrsiError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| PrsiError::Internal(format!("no session for {id}")))
    }

    /// The named identity behind a connection, or a violation if it has
    /// none yet.
    fn actor(&self, id: ConnectionId, verb: &str) -> Result<Actor, PrsiError> {
        let session = self.session(id)?;
        match (session.player(), session.nickname()) {
            (Some(player), Some(nickname)) => Ok(Actor {
                player,
                nickname: nickname.to_string(),
                location: session.location(),
            }),
            _ => Err(PrsiError::Violation(format!("{verb} before NAME"))),
        }
    }

    /// The actor and their room, if the connection is seated anywhere.
    fn seated(&self, id: ConnectionId) -> Option<(Actor, RoomId)> {
        let session = self.sessions.get(id)?;
        let room = session.location().room()?;
        let actor = Actor {
            player: session.player()?,
            nickname: session.nickname()?.to_string(),
            location: session.location(),
        };
        Some((actor, room))
    }

    fn nickname_of(&self, player: PlayerId) -> Option<String> {
        let id = self.sessions.find_by_player(player)?;
        self.sessions.get(id)?.nickname().map(str::to_string)
    }

    fn room_view(&self, room: RoomId) -> Option<RoomView> {
        let room = self.lobby.get(room)?;
        Some(room.view(|player| {
            let session = self.sessions.get(self.sessions.find_by_player(player)?)?;
            Some(PlayerView {
                nickname: session.nickname()?.to_string(),
                awake: session.is_awake(),
            })
        }))
    }

    fn turn_view(&self, room: RoomId) -> Option<TurnView> {
        let game = self.lobby.get(room)?.game()?;
        let current = game.current_player()?;
        Some(TurnView {
            nickname: self.nickname_of(current)?,
            top: game.top(),
        })
    }

    // -- Sending -------------------------------------------------------------

    fn reply(&mut self, id: ConnectionId, message: &ServerMessage) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.send(message);
        }
    }

    /// Queues `message` for every seated player of `room` except `except`,
    /// in seating order.
    fn broadcast(&mut self, room: RoomId, message: &ServerMessage, except: Option<PlayerId>) {
        let Some(room) = self.lobby.get(room) else {
            return;
        };
        for &player in room.players() {
            if except != Some(player) {
                self.sessions.send_to_player(player, message);
            }
        }
    }

    fn broadcast_turn(&mut self, room: RoomId) {
        if let Some(turn) = self.turn_view(room) {
            self.broadcast(room, &ServerMessage::Turn(turn), None);
        }
    }

    fn announce_wake(&mut self, id: ConnectionId) {
        if let Some((actor, room)) = self.seated(id) {
            tracing::info!(connection_id = %id, nickname = %actor.nickname, "player is back");
            self.broadcast(room, &ServerMessage::Awake(actor.nickname), Some(actor.player));
        }
    }

    // -- Room consequences ---------------------------------------------------

    /// Takes `actor` out of `room` and tells the others. An emptied room is
    /// dropped; a game left with one card holder ends by forfeit; a game
    /// that goes on announces whose turn it is.
    fn depart(&mut self, actor: &Actor, room: RoomId) -> Result<(), PrsiError> {
        let departure = self.lobby.room_mut(room)?.remove_player(actor.player)?;
        self.broadcast(room, &ServerMessage::Leave(actor.nickname.clone()), None);

        match departure {
            Departure::Emptied => {
                self.lobby.remove_room(room);
            }
            Departure::EndedGame => self.finish_game(room, Ending::Forfeit),
            Departure::Stayed => {
                let playing = self
                    .lobby
                    .get(room)
                    .is_some_and(|r| r.state() == RoomState::Playing);
                if playing {
                    self.broadcast_turn(room);
                }
            }
        }
        Ok(())
    }

    /// Announces the end of a game and moves the room to Finished.
    ///
    /// Whoever still holds cards gets `LOSE` after a played ending and
    /// `WIN` after a forfeit. Everyone then gets the `LEADERBOARD`.
    fn finish_game(&mut self, room: RoomId, ending: Ending) {
        let Some(entry) = self.lobby.get_mut(room) else {
            return;
        };
        entry.conclude();
        let Some(game) = entry.game() else {
            return;
        };

        let holders: Vec<PlayerId> = entry
            .players()
            .iter()
            .copied()
            .filter(|p| game.hand(*p).is_some_and(|hand| !hand.is_empty()))
            .collect();
        let standings = game.standings();

        let verdict = match ending {
            Ending::Played => ServerMessage::Lose,
            Ending::Forfeit => ServerMessage::Win,
        };
        for player in holders {
            self.sessions.send_to_player(player, &verdict);
        }

        let names: Vec<String> = standings
            .into_iter()
            .filter_map(|p| self.nickname_of(p))
            .collect();
        tracing::info!(room_id = %room, ?ending, leaderboard = ?names, "game over");
        self.broadcast(room, &ServerMessage::Leaderboard(names), None);
    }
}
