//! Transport layer for the Prsi server.
//!
//! Provides the [`Connection`] trait (non-blocking byte I/O on one peer)
//! and the [`Reactor`], a single-task readiness loop over a TCP listener
//! and all accepted streams.
//!
//! Nothing here knows about frames or players. The reactor reports which
//! connections became readable or writable; somebody else decides what to
//! do about it.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{Reactor, Readiness, TcpConnection};

use std::fmt;
use std::io;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single peer that can be read from and written to without blocking.
///
/// Both calls follow the OS contract: `Err(e)` with
/// `e.kind() == ErrorKind::WouldBlock` means "nothing to do right now",
/// and `Ok(0)` from [`try_read`](Connection::try_read) means the peer
/// closed its side.
pub trait Connection {
    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Reads whatever is available into `buf`.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes as much of `buf` as the socket accepts right now.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}
