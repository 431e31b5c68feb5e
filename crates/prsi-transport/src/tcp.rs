//! TCP connections and the readiness reactor.
//!
//! The reactor is one task waiting on many sockets at once. Every call to
//! [`Reactor::poll`] builds a readiness future per connection (read
//! interest always, write interest only while somebody asked for it),
//! races them against the listener and a timeout, and returns the batch of
//! events that are ready. The caller then does the actual non-blocking
//! reads and writes through [`Connection`].

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::io::Interest;
use tokio::net::{TcpListener, TcpStream};

use crate::{Connection, ConnectionId, TransportError};

// ---------------------------------------------------------------------------
// TcpConnection
// ---------------------------------------------------------------------------

/// One accepted TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl TcpConnection {
    /// Address of the remote end.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// One event reported by [`Reactor::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A new connection was accepted and registered for read events.
    Accepted { id: ConnectionId, peer: SocketAddr },

    /// An existing connection is ready for I/O.
    ///
    /// `readable` also covers "peer closed": the next read returns 0.
    /// `hangup` means the socket errored or is closed in both directions.
    Io {
        id: ConnectionId,
        readable: bool,
        writable: bool,
        hangup: bool,
    },
}

// ---------------------------------------------------------------------------
// Reactor
// ---------------------------------------------------------------------------

/// What ended one wait inside [`Reactor::poll`].
enum Wake {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Ready(ConnectionId, io::Result<tokio::io::Ready>),
    Timeout,
}

/// A readiness loop over one listener and every accepted stream.
pub struct Reactor {
    listener: TcpListener,
    connections: HashMap<ConnectionId, TcpConnection>,
    /// Connections that currently want write-readiness.
    writers: HashSet<ConnectionId>,
    next_id: u64,
    max_events: usize,
}

impl Reactor {
    /// Binds the listening socket.
    ///
    /// `max_events` bounds how many readiness events one
    /// [`poll`](Self::poll) returns.
    pub async fn bind(addr: &str, max_events: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP reactor listening");
        Ok(Self {
            listener,
            connections: HashMap::new(),
            writers: HashSet::new(),
            next_id: 1,
            max_events: max_events.max(1),
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::LocalAddr)
    }

    /// Waits up to `timeout` for readiness and returns what is ready.
    ///
    /// An empty vector means the timeout elapsed. Accepted connections are
    /// registered before this returns.
    ///
    /// # Errors
    /// [`TransportError::AcceptFailed`] if accepting failed. The reactor
    /// stays usable; callers usually log and poll again.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Vec<Readiness>, TransportError> {
        let mut events = Vec::new();

        // All borrows below are shared; registration of an accepted stream
        // waits until the futures are dropped.
        let accepted = {
            let mut waits: FuturesUnordered<_> = self
                .connections
                .iter()
                .map(|(&id, conn)| {
                    let interest = if self.writers.contains(&id) {
                        Interest::READABLE | Interest::WRITABLE
                    } else {
                        Interest::READABLE
                    };
                    async move { (id, conn.stream.ready(interest).await) }
                })
                .collect();

            let wake = tokio::select! {
                accepted = self.listener.accept() => Wake::Accepted(accepted),
                Some((id, ready)) = waits.next() => Wake::Ready(id, ready),
                () = tokio::time::sleep(timeout) => Wake::Timeout,
            };

            match wake {
                Wake::Accepted(accepted) => Some(accepted),
                Wake::Ready(id, ready) => {
                    events.push(to_event(id, ready));
                    // Collect whatever else is already ready without waiting.
                    while events.len() < self.max_events {
                        match waits.next().now_or_never() {
                            Some(Some((id, ready))) => events.push(to_event(id, ready)),
                            _ => break,
                        }
                    }
                    None
                }
                Wake::Timeout => None,
            }
        };

        if let Some(accepted) = accepted {
            let (stream, peer) = accepted.map_err(TransportError::AcceptFailed)?;
            events.push(self.register(stream, peer));
        }
        Ok(events)
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) -> Readiness {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%id, error = %e, "could not disable Nagle");
        }
        self.connections.insert(id, TcpConnection { id, peer, stream });
        tracing::debug!(%id, %peer, "accepted TCP connection");
        Readiness::Accepted { id, peer }
    }

    /// Adds or removes write interest for a connection. Unknown ids are
    /// ignored.
    pub fn set_write_interest(&mut self, id: ConnectionId, wanted: bool) {
        if wanted && self.connections.contains_key(&id) {
            self.writers.insert(id);
        } else {
            self.writers.remove(&id);
        }
    }

    /// Returns `true` if the connection currently has write interest.
    pub fn wants_write(&self, id: ConnectionId) -> bool {
        self.writers.contains(&id)
    }

    /// Deregisters and closes a connection. Returns `false` if it was not
    /// registered.
    pub fn close(&mut self, id: ConnectionId) -> bool {
        self.writers.remove(&id);
        match self.connections.remove(&id) {
            Some(conn) => {
                tracing::debug!(%id, peer = %conn.peer, "closed TCP connection");
                true
            }
            None => false,
        }
    }

    /// Looks up a registered connection.
    pub fn connection(&self, id: ConnectionId) -> Option<&TcpConnection> {
        self.connections.get(&id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn to_event(id: ConnectionId, ready: io::Result<tokio::io::Ready>) -> Readiness {
    match ready {
        Ok(ready) => Readiness::Io {
            id,
            readable: ready.is_readable(),
            writable: ready.is_writable(),
            hangup: ready.is_read_closed() && ready.is_write_closed(),
        },
        Err(_) => Readiness::Io {
            id,
            readable: false,
            writable: false,
            hangup: true,
        },
    }
}
