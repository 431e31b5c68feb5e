//! Wire protocol for the Prsi server.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Cards** ([`Card`], [`Suit`], [`Rank`]): the 32-card deck values and
//!   their two-character wire tokens.
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`PlayerId`],
//!   [`RoomId`], [`RoomState`], ...): the structured messages.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): frame extraction from a
//!   growing byte buffer and rendering of outgoing lines.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer does not know about sockets or rooms. It only turns
//! bytes into token lists, token lists into [`ClientMessage`]s, and
//! [`ServerMessage`]s back into text.
//!
//! ```text
//! Transport (bytes) → Protocol (tokens / messages) → Session → Server
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod card;
mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use card::{Card, Rank, Suit};
pub use codec::{Codec, TextCodec, DELIM, MAGIC};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Command, PlayerId, PlayerView, RoomId, RoomState, RoomSummary,
    RoomView, ServerMessage, StateView, TurnView,
};
