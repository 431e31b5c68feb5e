//! One live connection: buffers, identity, location, and liveness.
//!
//! A session never interprets what a frame *means*. It turns bytes into
//! token lists (with the help of its codec), turns outgoing messages into
//! bytes, and keeps the clock on how long the peer has been silent.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use prsi_protocol::{ClientMessage, Codec, PlayerId, RoomId, ServerMessage, TextCodec};
use prsi_transport::{Connection, ConnectionId};

use crate::{Liveness, LivenessConfig, LivenessEvent, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Limits and thresholds shared by every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Silence thresholds.
    pub liveness: LivenessConfig,

    /// Bytes read but not yet framed may not exceed this.
    pub max_buffered_bytes: usize,

    /// Size of one read from the socket.
    pub read_chunk: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness: LivenessConfig::default(),
            max_buffered_bytes: 1_000_000,
            read_chunk: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Where a connection currently stands. Each command is only legal in
/// some of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// Connected but no nickname yet.
    #[default]
    Unnamed,
    /// Named, not in any room.
    Lobby,
    /// Seated in a room that is still waiting for players.
    Room(RoomId),
    /// Seated in a room whose game has started (or finished).
    Game(RoomId),
}

impl Location {
    /// The room this location refers to, if any.
    pub fn room(&self) -> Option<RoomId> {
        match self {
            Self::Room(id) | Self::Game(id) => Some(*id),
            Self::Unnamed | Self::Lobby => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traffic
// ---------------------------------------------------------------------------

/// What one [`Session::on_readable`] call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traffic {
    /// Bytes appended to the read buffer.
    pub bytes: usize,
    /// The session was asleep and this traffic woke it up.
    pub woke: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connection on the server.
///
/// Created on accept, destroyed on disconnect or termination. The codec
/// type defaults to [`TextCodec`]; it is a parameter so tests and future
/// wire formats can plug in their own.
#[derive(Debug)]
pub struct Session<C: Codec = TextCodec> {
    id: ConnectionId,
    nickname: Option<String>,
    player: Option<PlayerId>,
    location: Location,

    read_buf: Vec<u8>,
    write_buf: Vec<u8>,

    last_received: Instant,
    last_ping: Instant,
    /// How many whole `sleep_after` periods of silence have been observed.
    missed: u32,
    liveness: Liveness,

    codec: C,
    config: SessionConfig,
}

impl Session<TextCodec> {
    /// Creates an unnamed session for a freshly accepted connection.
    pub fn new(id: ConnectionId, config: SessionConfig, now: Instant) -> Self {
        Self::with_codec(id, config, now, TextCodec)
    }
}

impl<C: Codec> Session<C> {
    /// Creates an unnamed session that frames with `codec`.
    pub fn with_codec(id: ConnectionId, config: SessionConfig, now: Instant, codec: C) -> Self {
        Self {
            id,
            nickname: None,
            player: None,
            location: Location::Unnamed,
            read_buf: Vec::new(),
            write_buf: Vec::new(),
            last_received: now,
            last_ping: now,
            missed: 0,
            liveness: Liveness::Awake,
            codec,
            config,
        }
    }

    // -- Identity ----------------------------------------------------------

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    /// Binds a nickname and player id to this connection and moves it to
    /// the lobby. A nickname is set once and never changes.
    ///
    /// # Errors
    /// [`SessionError::AlreadyNamed`] if the session already has one.
    pub fn assign(&mut self, player: PlayerId, nickname: &str) -> Result<(), SessionError> {
        if self.nickname.is_some() {
            return Err(SessionError::AlreadyNamed(self.id));
        }
        self.nickname = Some(nickname.to_string());
        self.player = Some(player);
        self.location = Location::Lobby;
        Ok(())
    }

    /// Moves nickname, player id and location over from `other`, leaving
    /// `other` unnamed. Used when a new connection reclaims a sleeping
    /// player.
    pub(crate) fn take_identity(&mut self, other: &mut Session<C>) {
        self.nickname = other.nickname.take();
        self.player = other.player.take();
        self.location = std::mem::take(&mut other.location);
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    // -- Reading -------------------------------------------------------------

    /// Drains the socket into the read buffer until it would block.
    ///
    /// Any received byte counts as traffic: it resets the silence clock and
    /// wakes a sleeping session.
    ///
    /// # Errors
    /// [`SessionError::PeerClosed`] on a zero-byte read,
    /// [`SessionError::Io`] on any other failure, and
    /// [`SessionError::BufferOverflow`] when the unframed backlog grows
    /// past the configured limit. All of them are fatal.
    pub fn on_readable(
        &mut self,
        conn: &impl Connection,
        now: Instant,
    ) -> Result<Traffic, SessionError> {
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        let mut bytes = 0;

        loop {
            match conn.try_read(&mut chunk) {
                Ok(0) => return Err(SessionError::PeerClosed),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                    bytes += n;
                    if self.read_buf.len() > self.config.max_buffered_bytes {
                        return Err(SessionError::BufferOverflow {
                            limit: self.config.max_buffered_bytes,
                        });
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Io(e)),
            }
        }

        let woke = bytes > 0 && self.touch(now);
        Ok(Traffic { bytes, woke })
    }

    /// Pulls every complete frame out of the read buffer.
    ///
    /// Frames with no tokens are dropped silently. A partial frame stays
    /// in the buffer for the next call.
    ///
    /// # Errors
    /// [`SessionError::Protocol`] when the buffer starts with something
    /// that is not the protocol magic, or a frame is not text.
    pub fn pop_frames(&mut self) -> Result<Vec<Vec<String>>, SessionError> {
        let mut frames = Vec::new();
        while self.codec.could_be_valid(&self.read_buf) {
            if !self.codec.is_well_formed(&self.read_buf) {
                return Err(prsi_protocol::ProtocolError::MalformedFrame.into());
            }
            match self.codec.extract_frame(&mut self.read_buf)? {
                Some(tokens) if tokens.is_empty() => continue,
                Some(tokens) => frames.push(tokens),
                None => break,
            }
        }
        Ok(frames)
    }

    /// Decodes one popped frame with this session's codec.
    pub fn decode(&self, tokens: &[String]) -> Result<ClientMessage, SessionError> {
        Ok(self.codec.decode(tokens)?)
    }

    /// Bytes received but not yet framed.
    pub fn buffered_input(&self) -> usize {
        self.read_buf.len()
    }

    // -- Writing -------------------------------------------------------------

    /// Appends already rendered text to the write buffer.
    pub fn enqueue(&mut self, text: &str) {
        self.write_buf.extend_from_slice(text.as_bytes());
    }

    /// Renders `message` with the session's codec and queues it.
    pub fn send(&mut self, message: &ServerMessage) {
        let line = self.codec.encode(message);
        tracing::trace!(connection_id = %self.id, line = line.trim_end(), "queued");
        self.enqueue(&line);
    }

    /// `true` while there are unsent bytes, i.e. while the session wants
    /// write-readiness.
    pub fn wants_write(&self) -> bool {
        !self.write_buf.is_empty()
    }

    /// The bytes still waiting to be written.
    pub fn pending_output(&self) -> &[u8] {
        &self.write_buf
    }

    /// Makes one non-blocking write attempt.
    ///
    /// Returns `Ok(true)` when the buffer is fully drained. A partial write
    /// keeps the remainder; "would block" is not an error.
    ///
    /// # Errors
    /// [`SessionError::Io`] when the write fails for any other reason.
    pub fn on_writable(&mut self, conn: &impl Connection) -> Result<bool, SessionError> {
        if self.write_buf.is_empty() {
            return Ok(true);
        }
        match conn.try_write(&self.write_buf) {
            Ok(0) => Err(SessionError::Io(ErrorKind::WriteZero.into())),
            Ok(n) => {
                self.write_buf.drain(..n);
                Ok(self.write_buf.is_empty())
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(false)
            }
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    // -- Liveness ------------------------------------------------------------

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_awake(&self) -> bool {
        self.liveness.is_awake()
    }

    /// How many whole sleep periods the peer has been silent for.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Records traffic at `now`. Returns `true` if this woke the session
    /// from Sleep.
    pub fn touch(&mut self, now: Instant) -> bool {
        self.last_received = now;
        self.missed = 0;
        if self.liveness == Liveness::Sleep {
            self.liveness = Liveness::Awake;
            tracing::info!(connection_id = %self.id, "session woke up");
            return true;
        }
        false
    }

    /// Returns `true` (and restarts the ping clock) when a ping is due.
    pub fn ping_due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_ping) > self.config.liveness.ping_interval {
            self.last_ping = now;
            return true;
        }
        false
    }

    /// Re-evaluates liveness against the thresholds.
    ///
    /// Each transition is reported once: `FellAsleep` on the first crossing
    /// of the sleep threshold since the last traffic, `Died` once ever.
    pub fn check_liveness(&mut self, now: Instant) -> Option<LivenessEvent> {
        if self.liveness == Liveness::Dead {
            return None;
        }

        let silent = now.saturating_duration_since(self.last_received);
        let thresholds = self.config.liveness;

        if silent > thresholds.dead_after {
            self.liveness = Liveness::Dead;
            tracing::warn!(connection_id = %self.id, ?silent, "session is dead");
            return Some(LivenessEvent::Died);
        }

        if silent > thresholds.sleep_after {
            let missed = periods(silent, thresholds.sleep_after);
            let first = self.missed == 0;
            self.missed = self.missed.max(missed);
            if first && self.liveness == Liveness::Awake {
                self.liveness = Liveness::Sleep;
                tracing::warn!(connection_id = %self.id, ?silent, "session fell asleep");
                return Some(LivenessEvent::FellAsleep);
            }
        }
        None
    }
}

/// Whole `period`s contained in `elapsed`, saturating.
fn periods(elapsed: Duration, period: Duration) -> u32 {
    let period = period.as_millis().max(1);
    u32::try_from(elapsed.as_millis() / period).unwrap_or(u32::MAX)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    /// An in-memory connection: reads come from a script, writes are
    /// recorded (optionally capped per call).
    #[derive(Default)]
    struct Scripted {
        reads: RefCell<VecDeque<io::Result<Vec<u8>>>>,
        written: RefCell<Vec<u8>>,
        write_cap: Option<usize>,
        write_error: Option<ErrorKind>,
    }

    impl Scripted {
        fn with_reads(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: RefCell::new(reads.into()),
                ..Self::default()
            }
        }
    }

    impl Connection for Scripted {
        fn id(&self) -> ConnectionId {
            ConnectionId::new(1)
        }

        fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.reads.borrow_mut().pop_front();
            match next {
                None => Err(ErrorKind::WouldBlock.into()),
                Some(Err(e)) => Err(e),
                Some(Ok(mut bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        let rest = bytes.split_off(n);
                        self.reads.borrow_mut().push_front(Ok(rest));
                    }
                    Ok(n)
                }
            }
        }

        fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_error {
                return Err(kind.into());
            }
            let n = self.write_cap.map_or(buf.len(), |cap| cap.min(buf.len()));
            self.written.borrow_mut().extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    fn session(now: Instant) -> Session {
        Session::new(ConnectionId::new(1), SessionConfig::default(), now)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // =====================================================================
    // Identity and location
    // =====================================================================

    #[test]
    fn test_session_new_is_unnamed_and_awake() {
        let s = session(Instant::now());
        assert_eq!(s.location(), Location::Unnamed);
        assert_eq!(s.nickname(), None);
        assert!(s.is_awake());
        assert!(!s.wants_write());
    }

    #[test]
    fn test_assign_moves_to_lobby() {
        let mut s = session(Instant::now());
        s.assign(PlayerId(5), "alice").unwrap();
        assert_eq!(s.nickname(), Some("alice"));
        assert_eq!(s.player(), Some(PlayerId(5)));
        assert_eq!(s.location(), Location::Lobby);
    }

    #[test]
    fn test_assign_twice_fails() {
        let mut s = session(Instant::now());
        s.assign(PlayerId(5), "alice").unwrap();
        let err = s.assign(PlayerId(6), "bob").unwrap_err();
        assert!(matches!(err, SessionError::AlreadyNamed(_)));
        assert_eq!(s.nickname(), Some("alice"));
    }

    #[test]
    fn test_location_room_accessor() {
        assert_eq!(Location::Room(RoomId(2)).room(), Some(RoomId(2)));
        assert_eq!(Location::Game(RoomId(3)).room(), Some(RoomId(3)));
        assert_eq!(Location::Lobby.room(), None);
    }

    // =====================================================================
    // Reading and framing
    // =====================================================================

    #[test]
    fn test_on_readable_drains_until_would_block() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![
            Ok(b"PRSI NAME al".to_vec()),
            Ok(b"ice |\n".to_vec()),
        ]);

        let traffic = s.on_readable(&conn, now).unwrap();

        assert_eq!(traffic.bytes, 18);
        assert!(!traffic.woke);
        assert_eq!(s.pop_frames().unwrap(), vec![vec!["NAME".to_string(), "alice".to_string()]]);
    }

    #[test]
    fn test_on_readable_reads_in_chunks() {
        let now = Instant::now();
        let config = SessionConfig { read_chunk: 4, ..SessionConfig::default() };
        let mut s = Session::new(ConnectionId::new(1), config, now);
        let conn = Scripted::with_reads(vec![Ok(b"PRSI PONG |\n".to_vec())]);

        let traffic = s.on_readable(&conn, now).unwrap();

        assert_eq!(traffic.bytes, 12);
        assert_eq!(s.buffered_input(), 12);
    }

    #[test]
    fn test_on_readable_zero_bytes_is_peer_closed() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Ok(vec![])]);

        assert!(matches!(s.on_readable(&conn, now), Err(SessionError::PeerClosed)));
    }

    #[test]
    fn test_on_readable_io_error_is_fatal() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Err(ErrorKind::ConnectionReset.into())]);

        assert!(matches!(s.on_readable(&conn, now), Err(SessionError::Io(_))));
    }

    #[test]
    fn test_on_readable_over_limit_is_overflow() {
        let now = Instant::now();
        let config = SessionConfig { max_buffered_bytes: 8, ..SessionConfig::default() };
        let mut s = Session::new(ConnectionId::new(1), config, now);
        let conn = Scripted::with_reads(vec![Ok(b"PRSI NAME aaaaaaaaa".to_vec())]);

        assert!(matches!(
            s.on_readable(&conn, now),
            Err(SessionError::BufferOverflow { limit: 8 })
        ));
    }

    #[test]
    fn test_pop_frames_many_at_once_and_keeps_partial() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Ok(
            b"PRSI PONG |\n PRSI LIST_ROOMS | PRSI JOIN".to_vec(),
        )]);
        s.on_readable(&conn, now).unwrap();

        let frames = s.pop_frames().unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], vec!["LIST_ROOMS".to_string()]);
        assert_eq!(s.buffered_input(), " PRSI JOIN".len());
    }

    #[test]
    fn test_pop_frames_skips_empty_frames() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Ok(b"PRSI |\nPRSI DRAW |\n".to_vec())]);
        s.on_readable(&conn, now).unwrap();

        assert_eq!(s.pop_frames().unwrap(), vec![vec!["DRAW".to_string()]]);
    }

    #[test]
    fn test_pop_frames_garbage_is_protocol_error() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Ok(b"HELLO THERE |\n".to_vec())]);
        s.on_readable(&conn, now).unwrap();

        assert!(matches!(s.pop_frames(), Err(SessionError::Protocol(_))));
    }

    #[test]
    fn test_pop_frames_short_prefix_waits() {
        let now = Instant::now();
        let mut s = session(now);
        let conn = Scripted::with_reads(vec![Ok(b"  PR".to_vec())]);
        s.on_readable(&conn, now).unwrap();

        assert!(s.pop_frames().unwrap().is_empty());
        assert_eq!(s.buffered_input(), 4);
    }

    #[test]
    fn test_decode_uses_session_codec() {
        let s = session(Instant::now());
        let message = s.decode(&["PASS".to_string()]).unwrap();
        assert_eq!(message, ClientMessage::Pass);
    }

    // =====================================================================
    // Writing
    // =====================================================================

    #[test]
    fn test_send_then_full_write_clears_interest() {
        let mut s = session(Instant::now());
        let conn = Scripted::default();

        s.send(&ServerMessage::Ping);
        assert!(s.wants_write());

        assert!(s.on_writable(&conn).unwrap());
        assert!(!s.wants_write());
        assert_eq!(conn.written.borrow().as_slice(), b"PRSI PING |\n");
    }

    #[test]
    fn test_partial_write_keeps_remainder_in_order() {
        let mut s = session(Instant::now());
        let conn = Scripted { write_cap: Some(5), ..Scripted::default() };

        s.enqueue("first\n");
        s.enqueue("second\n");

        assert!(!s.on_writable(&conn).unwrap());
        assert_eq!(s.pending_output(), b"\nsecond\n");
        while !s.on_writable(&conn).unwrap() {}
        assert_eq!(conn.written.borrow().as_slice(), b"first\nsecond\n");
    }

    #[test]
    fn test_would_block_write_is_not_an_error() {
        let mut s = session(Instant::now());
        let conn = Scripted {
            write_error: Some(ErrorKind::WouldBlock),
            ..Scripted::default()
        };
        s.enqueue("x");

        assert!(!s.on_writable(&conn).unwrap());
        assert!(s.wants_write());
    }

    #[test]
    fn test_broken_pipe_write_is_fatal() {
        let mut s = session(Instant::now());
        let conn = Scripted {
            write_error: Some(ErrorKind::BrokenPipe),
            ..Scripted::default()
        };
        s.enqueue("x");

        assert!(matches!(s.on_writable(&conn), Err(SessionError::Io(_))));
    }

    // =====================================================================
    // Liveness
    // =====================================================================

    #[test]
    fn test_ping_due_after_interval_only() {
        let start = Instant::now();
        let mut s = session(start);

        assert!(!s.ping_due(start + ms(1_000)));
        assert!(s.ping_due(start + ms(2_001)));
        assert!(!s.ping_due(start + ms(3_000)));
        assert!(s.ping_due(start + ms(4_100)));
    }

    #[test]
    fn test_check_liveness_falls_asleep_once() {
        let start = Instant::now();
        let mut s = session(start);

        assert_eq!(s.check_liveness(start + ms(4_000)), None);
        assert_eq!(s.check_liveness(start + ms(5_100)), Some(LivenessEvent::FellAsleep));
        assert_eq!(s.liveness(), Liveness::Sleep);
        assert_eq!(s.check_liveness(start + ms(10_500)), None);
        assert_eq!(s.check_liveness(start + ms(20_000)), None);
        assert_eq!(s.missed(), 4);
    }

    #[test]
    fn test_check_liveness_dies_exactly_once() {
        let start = Instant::now();
        let mut s = session(start);

        assert_eq!(s.check_liveness(start + ms(180_001)), Some(LivenessEvent::Died));
        assert_eq!(s.liveness(), Liveness::Dead);
        assert_eq!(s.check_liveness(start + ms(200_000)), None);
    }

    #[test]
    fn test_traffic_wakes_sleeping_session_once() {
        let start = Instant::now();
        let mut s = session(start);
        s.check_liveness(start + ms(6_000));

        let conn = Scripted::with_reads(vec![Ok(b"PRSI PONG |\n".to_vec())]);
        let traffic = s.on_readable(&conn, start + ms(6_500)).unwrap();
        assert!(traffic.woke);
        assert!(s.is_awake());
        assert_eq!(s.missed(), 0);

        let conn = Scripted::with_reads(vec![Ok(b"PRSI PONG |\n".to_vec())]);
        let traffic = s.on_readable(&conn, start + ms(7_000)).unwrap();
        assert!(!traffic.woke);
    }

    #[test]
    fn test_traffic_does_not_revive_dead_session() {
        let start = Instant::now();
        let mut s = session(start);
        s.check_liveness(start + ms(200_000));

        assert!(!s.touch(start + ms(200_001)));
        assert_eq!(s.liveness(), Liveness::Dead);
    }

    #[test]
    fn test_sleep_again_after_waking_reports_again() {
        let start = Instant::now();
        let mut s = session(start);
        s.check_liveness(start + ms(6_000));
        s.touch(start + ms(6_100));

        assert_eq!(s.check_liveness(start + ms(11_200)), Some(LivenessEvent::FellAsleep));
    }
}
