//! Error types for the rules engine.
//!
//! Every variant is a rule violation by the acting player. The server
//! treats them all as protocol violations.

use prsi_protocol::{Card, PlayerId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    /// Fewer than two players were seated.
    #[error("a game needs at least 2 players, got {0}")]
    NotEnoughPlayers(usize),

    /// So many players that not even one card each fits in the deck.
    #[error("{0} players do not fit one deck")]
    TooManyPlayers(usize),

    /// The player has no seat in this game.
    #[error("player {0} is not seated")]
    NotSeated(PlayerId),

    /// The player acted while someone else was on turn.
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    /// The game is already over.
    #[error("the game is finished")]
    Finished,

    /// The card is not in the player's hand.
    #[error("{0} is not in hand")]
    CardNotInHand(Card),

    /// The card cannot be played on the current top.
    #[error("{card} cannot be played on {top}")]
    IllegalCard { card: Card, top: Card },

    /// Drawing is not allowed while an Ace or Seven effect is pending.
    #[error("a pending effect must be answered or passed")]
    PenaltyPending,

    /// Passing is only allowed while an effect is pending.
    #[error("nothing to pass")]
    NothingToPass,
}
