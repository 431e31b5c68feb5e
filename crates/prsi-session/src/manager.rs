//! The session manager: every live connection, indexed by connection id
//! and by nickname.
//!
//! `SessionManager` is a plain single-owner structure. The server loop owns
//! it, and nothing else ever holds a session across a call.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use prsi_protocol::{PlayerId, ServerMessage};
use prsi_transport::ConnectionId;

use crate::{LivenessEvent, Session, SessionConfig, SessionError};

/// Something the liveness sweep found that the server must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepEvent {
    pub connection: ConnectionId,
    pub event: LivenessEvent,
}

/// Registry of all sessions.
///
/// ```text
/// open() ──→ [Unnamed] ──name()──→ [named] ──close()──→ gone
///                                     │
///                    reclaim(old, new) moves the identity to a new connection
/// ```
pub struct SessionManager {
    /// Ordered by connection id so sweeps and lookups are deterministic.
    sessions: BTreeMap<ConnectionId, Session>,

    /// Nickname → owning connection. Kept in sync with `sessions`.
    nicknames: HashMap<String, ConnectionId>,

    /// Player → owning connection. Moves along with the nickname.
    players: HashMap<PlayerId, ConnectionId>,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates an empty manager; every session it opens uses `config`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: BTreeMap::new(),
            nicknames: HashMap::new(),
            players: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens an unnamed session for a freshly accepted connection.
    pub fn open(&mut self, id: ConnectionId, now: Instant) -> &mut Session {
        tracing::debug!(connection_id = %id, "session opened");
        self.sessions
            .entry(id)
            .or_insert_with(|| Session::new(id, self.config.clone(), now))
    }

    /// Removes a session. The nickname becomes free again.
    pub fn close(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        if let Some(nick) = session.nickname() {
            if self.nicknames.get(nick) == Some(&id) {
                self.nicknames.remove(nick);
            }
        }
        if let Some(player) = session.player() {
            if self.players.get(&player) == Some(&id) {
                self.players.remove(&player);
            }
        }
        tracing::debug!(connection_id = %id, "session closed");
        Some(session)
    }

    /// Registers `nickname` for an unnamed session.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if `id` is not open.
    /// - [`SessionError::NicknameTaken`] if another session holds the name.
    /// - [`SessionError::AlreadyNamed`] if this session already has a name.
    pub fn name(
        &mut self,
        id: ConnectionId,
        player: PlayerId,
        nickname: &str,
    ) -> Result<(), SessionError> {
        if self.nicknames.contains_key(nickname) {
            return Err(SessionError::NicknameTaken(nickname.to_string()));
        }
        let session = self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.assign(player, nickname)?;
        self.nicknames.insert(nickname.to_string(), id);
        self.players.insert(player, id);
        tracing::info!(connection_id = %id, %player, nickname, "session named");
        Ok(())
    }

    /// Moves the identity of `old` onto the unnamed session `new` and
    /// removes `old`, which is returned so the caller can close its socket.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if either session is missing.
    /// - [`SessionError::AlreadyNamed`] if `new` already has a name.
    pub fn reclaim(
        &mut self,
        old: ConnectionId,
        new: ConnectionId,
    ) -> Result<Session, SessionError> {
        match self.sessions.get(&new) {
            None => return Err(SessionError::NotFound(new)),
            Some(s) if s.nickname().is_some() => return Err(SessionError::AlreadyNamed(new)),
            Some(_) => {}
        }
        let mut previous = self.sessions.remove(&old).ok_or(SessionError::NotFound(old))?;

        let Some(session) = self.sessions.get_mut(&new) else {
            // `new` was checked above and only `old` was removed.
            self.sessions.insert(old, previous);
            return Err(SessionError::NotFound(new));
        };
        session.take_identity(&mut previous);
        if let Some(nick) = session.nickname() {
            self.nicknames.insert(nick.to_string(), new);
        }
        if let Some(player) = session.player() {
            self.players.insert(player, new);
        }
        tracing::info!(from = %old, to = %new, nickname = ?session.nickname(), "session reclaimed");
        Ok(previous)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Looks up the connection that owns `nickname`.
    pub fn find_by_nickname(&self, nickname: &str) -> Option<ConnectionId> {
        self.nicknames.get(nickname).copied()
    }

    /// Looks up the connection that currently carries `player`.
    pub fn find_by_player(&self, player: PlayerId) -> Option<ConnectionId> {
        self.players.get(&player).copied()
    }

    /// Queues `message` for `player`. Returns `false` if nobody carries
    /// that player right now.
    pub fn send_to_player(&mut self, player: PlayerId, message: &ServerMessage) -> bool {
        let Some(id) = self.find_by_player(player) else {
            return false;
        };
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.send(message);
                true
            }
            None => false,
        }
    }

    /// Sends pings that are due and collects liveness transitions.
    ///
    /// Sessions are visited in connection-id order.
    pub fn sweep(&mut self, now: Instant) -> Vec<SweepEvent> {
        let mut events = Vec::new();
        for (&id, session) in &mut self.sessions {
            if session.ping_due(now) {
                session.send(&ServerMessage::Ping);
            }
            if let Some(event) = session.check_liveness(now) {
                events.push(SweepEvent { connection: id, event });
            }
        }
        events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
