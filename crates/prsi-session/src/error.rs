//! Error types for the session layer.

use prsi_protocol::ProtocolError;
use prsi_transport::ConnectionId;

/// Errors that can occur while serving one connection.
///
/// Every I/O and framing variant is fatal to the session that produced it
/// and to no other.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer closed its end (a read returned zero bytes).
    #[error("peer closed the connection")]
    PeerClosed,

    /// Reading or writing the socket failed.
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// More unframed bytes piled up than the configured limit.
    #[error("read buffer exceeded {limit} bytes")]
    BufferOverflow { limit: usize },

    /// The buffered bytes can never form a valid frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No session exists for the given connection.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// The connection already registered a nickname.
    #[error("{0} is already named")]
    AlreadyNamed(ConnectionId),

    /// Another session holds the nickname.
    #[error("nickname {0} is taken")]
    NicknameTaken(String),
}
