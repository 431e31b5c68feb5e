//! In-memory connections and a fake clock for driving [`ServerState`]
//! without sockets.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use prsi_game::Game;
use prsi_protocol::{Card, PlayerId, RoomId};
use prsi_transport::{Connection, ConnectionId};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{ServerConfig, ServerState};

/// A connection whose peer is the test. Reads come from `inbox`, writes
/// land in `outbox`.
pub(crate) struct MemoryConnection {
    id: ConnectionId,
    inbox: RefCell<VecDeque<u8>>,
    outbox: RefCell<Vec<u8>>,
    eof: Cell<bool>,
}

impl MemoryConnection {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            inbox: RefCell::new(VecDeque::new()),
            outbox: RefCell::new(Vec::new()),
            eof: Cell::new(false),
        }
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbox = self.inbox.borrow_mut();
        if inbox.is_empty() {
            return if self.eof.get() {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(inbox.len());
        for (slot, byte) in buf.iter_mut().zip(inbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.outbox.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Drives a [`ServerState`] the way the reactor loop would.
pub(crate) struct Harness {
    pub(crate) state: ServerState,
    now: Instant,
    next_id: u64,
    closed: Vec<ConnectionId>,
}

impl Harness {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self::with_seed(config, 7)
    }

    pub(crate) fn with_seed(config: ServerConfig, seed: u64) -> Self {
        Self {
            state: ServerState::new(config.validated(), StdRng::seed_from_u64(seed)),
            now: Instant::now(),
            next_id: 1,
            closed: Vec::new(),
        }
    }

    /// Accepts a new connection.
    pub(crate) fn connect(&mut self) -> MemoryConnection {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        self.state.accept(id, self.now);
        self.settle();
        MemoryConnection::new(id)
    }

    /// Connects and registers `nickname`, discarding the `OK NAME`.
    pub(crate) fn named(&mut self, nickname: &str) -> MemoryConnection {
        let conn = self.connect();
        self.send(&conn, &format!("NAME {nickname}"));
        assert_eq!(self.recv(&conn), vec!["OK NAME"]);
        conn
    }

    /// Alice creates room 0, Bob joins it and the game starts. All output
    /// so far is discarded.
    pub(crate) fn game_pair(&mut self) -> (MemoryConnection, MemoryConnection) {
        let alice = self.named("alice");
        let bob = self.named("bob");
        self.send(&alice, "CREATE_ROOM");
        self.send(&bob, "JOIN_ROOM 0");
        self.recv(&alice);
        self.recv(&bob);
        (alice, bob)
    }

    /// Alice creates room 0, Bob and Carol fill it and the game starts.
    /// Needs a room capacity of three. All output so far is discarded.
    pub(crate) fn game_trio(&mut self) -> (MemoryConnection, MemoryConnection, MemoryConnection) {
        let alice = self.named("alice");
        let bob = self.named("bob");
        let carol = self.named("carol");
        self.send(&alice, "CREATE_ROOM");
        self.send(&bob, "JOIN_ROOM 0");
        self.send(&carol, "JOIN_ROOM 0");
        for conn in [&alice, &bob, &carol] {
            self.recv(conn);
        }
        (alice, bob, carol)
    }

    /// Replaces the running game of `room` with a fixed position.
    ///
    /// `hands` pairs nicknames with space-separated cards, in seating
    /// order. The last card of `deck` is drawn first.
    pub(crate) fn deal(&mut self, room: RoomId, hands: &[(&str, &str)], top: &str, deck: &str) {
        let hands = hands
            .iter()
            .map(|(nickname, cards)| (self.player_of(nickname), parse_cards(cards)))
            .collect();
        let game = Game::from_position(hands, parse_card(top), parse_cards(deck), 1);
        let slot = self
            .state
            .lobby_mut()
            .get_mut(room)
            .and_then(|r| r.game_mut())
            .expect("room has a running game");
        *slot = game;
    }

    /// Sends one frame with the given body, e.g. `"JOIN_ROOM 0"`.
    pub(crate) fn send(&mut self, conn: &MemoryConnection, body: &str) {
        self.send_raw(conn, format!("PRSI {body} |\n").as_bytes());
    }

    pub(crate) fn send_raw(&mut self, conn: &MemoryConnection, bytes: &[u8]) {
        conn.inbox.borrow_mut().extend(bytes.iter().copied());
        self.state.on_readable(conn, self.now);
        self.settle();
    }

    /// The peer closes its side.
    pub(crate) fn hang_up(&mut self, conn: &MemoryConnection) {
        conn.eof.set(true);
        self.state.on_readable(conn, self.now);
        self.settle();
    }

    /// Moves the clock forward and runs a liveness sweep.
    pub(crate) fn advance(&mut self, by: Duration) {
        self.now += by;
        self.state.sweep(self.now);
        self.settle();
    }

    /// Flushes `conn` and returns the bodies of every complete line it
    /// received since the last call, without `PRSI ` and ` |`.
    pub(crate) fn recv(&mut self, conn: &MemoryConnection) -> Vec<String> {
        self.state.on_writable(conn);
        self.settle();
        let bytes = std::mem::take(&mut *conn.outbox.borrow_mut());
        String::from_utf8(bytes)
            .expect("server writes text")
            .lines()
            .map(|line| {
                line.strip_prefix("PRSI ")
                    .and_then(|l| l.strip_suffix(" |"))
                    .unwrap_or(line)
                    .to_string()
            })
            .collect()
    }

    pub(crate) fn is_closed(&self, conn: &MemoryConnection) -> bool {
        self.closed_count(conn) > 0
    }

    /// How many times the server asked for `conn` to be closed.
    pub(crate) fn closed_count(&self, conn: &MemoryConnection) -> usize {
        self.closed.iter().filter(|id| **id == conn.id).count()
    }

    /// The cards `nickname` currently holds.
    pub(crate) fn hand_of(&self, nickname: &str) -> Vec<Card> {
        let sessions = self.state.sessions();
        let session = sessions
            .find_by_nickname(nickname)
            .and_then(|id| sessions.get(id))
            .expect("nickname is connected");
        let player = session.player().expect("session is named");
        let room = session.location().room().expect("player is seated");
        self.state
            .lobby()
            .get(room)
            .and_then(|r| r.game())
            .and_then(|g| g.hand(player))
            .expect("player holds a hand")
            .to_vec()
    }

    /// A card `nickname` could legally play right now, if any.
    pub(crate) fn playable_card(&self, nickname: &str) -> Option<Card> {
        let hand = self.hand_of(nickname);
        let session = self
            .state
            .sessions()
            .find_by_nickname(nickname)
            .and_then(|id| self.state.sessions().get(id))?;
        let game = self.state.lobby().get(session.location().room()?)?.game()?;
        hand.into_iter().find(|card| game.is_valid_play(*card))
    }

    fn player_of(&self, nickname: &str) -> PlayerId {
        let sessions = self.state.sessions();
        sessions
            .find_by_nickname(nickname)
            .and_then(|id| sessions.get(id))
            .and_then(|s| s.player())
            .expect("nickname is registered")
    }

    fn settle(&mut self) {
        self.closed.extend(self.state.take_closed());
    }
}

fn parse_card(token: &str) -> Card {
    token.parse().expect("valid card token")
}

fn parse_cards(tokens: &str) -> Vec<Card> {
    tokens.split_whitespace().map(parse_card).collect()
}
