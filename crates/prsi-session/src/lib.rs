//! Per-connection sessions for the Prsi server.
//!
//! This crate handles everything that is about *one connection* and not
//! about the game:
//!
//! 1. **Buffering**: raw bytes in, complete frames out; rendered lines in,
//!    bytes out when the socket allows ([`Session`]).
//! 2. **Liveness**: pings, and the Awake → Sleep → Dead state machine
//!    driven by silence ([`Liveness`], [`LivenessConfig`]).
//! 3. **Bookkeeping**: who is connected, under which nickname
//!    ([`SessionManager`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)        ← routes decoded messages, owns rooms
//!     ↕
//! Session (this crate)  ← buffers, liveness, identity of a connection
//!     ↕
//! Protocol / Transport  ← codec, ConnectionId, non-blocking I/O
//! ```

mod error;
mod liveness;
mod manager;
mod session;

pub use error::SessionError;
pub use liveness::{Liveness, LivenessConfig, LivenessEvent};
pub use manager::{SessionManager, SweepEvent};
pub use session::{Location, Session, SessionConfig, Traffic};
