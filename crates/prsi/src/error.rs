//! Unified error type for the Prsi server.

use prsi_game::GameError;
use prsi_protocol::ProtocolError;
use prsi_room::RoomError;
use prsi_session::SessionError;
use prsi_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Inside the server every handler returns this type and the dispatcher
/// treats any `Err` the same way: the offending session is terminated.
/// Only transport errors ever leave [`PrsiServer::run`](crate::PrsiServer::run).
#[derive(Debug, thiserror::Error)]
pub enum PrsiError {
    /// Binding, accepting or addressing the listener failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection broke, overflowed or misused its identity.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room or lobby operation was refused.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A game action broke the rules.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A command arrived in a location or room state that does not allow it.
    #[error("protocol violation: {0}")]
    Violation(String),

    /// Server bookkeeping disagreed with itself.
    #[error("internal error: {0}")]
    Internal(String),
}
