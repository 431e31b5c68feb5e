//! The Prsi rules engine.
//!
//! - [`deck`]: pure functions over collections of cards.
//! - [`Game`]: one running game: deck, discard pile, seats, turn order,
//!   pending Ace/Seven effects and the leaderboard.
//!
//! The engine only knows [`PlayerId`](prsi_protocol::PlayerId)s and
//! [`Card`](prsi_protocol::Card)s. It never sends anything: every
//! operation returns an outcome and the caller decides who hears about it.

pub mod deck;
mod error;
mod game;

pub use error::GameError;
pub use game::{DrawOutcome, Game, GamePhase, PassOutcome, Penalty, PlayOutcome};
