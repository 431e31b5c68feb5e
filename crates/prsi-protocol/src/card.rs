//! The 32-card deck used by Prsi.
//!
//! A card travels on the wire as two characters: suit first, rank second.
//! `SA` is the Ace of Hearts, `Z0` the ten of Clubs, `LQ` the Over of
//! Spades.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Suit
// ---------------------------------------------------------------------------

/// One of the four suits.
///
/// The wire characters come from the Czech suit names the clients already
/// use for their card images: **S**rdce, **Z**aludy, **L**isty, **K**ule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Hearts,
    Clubs,
    Spades,
    Diamonds,
}

impl Suit {
    /// All suits, in deck-building order.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Clubs, Suit::Spades, Suit::Diamonds];

    /// The single wire character for this suit.
    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts => 'S',
            Suit::Clubs => 'Z',
            Suit::Spades => 'L',
            Suit::Diamonds => 'K',
        }
    }

    /// Parses a wire character. Returns `None` for anything else.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            'S' => Some(Suit::Hearts),
            'Z' => Some(Suit::Clubs),
            'L' => Some(Suit::Spades),
            'K' => Some(Suit::Diamonds),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// One of the eight ranks of a Prsi deck (7 up to Ace, no numerals below 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Seven,
    Eight,
    Nine,
    Ten,
    Under,
    /// The "Menic": playable on anything that is not blocked.
    Over,
    King,
    Ace,
}

impl Rank {
    /// All ranks, lowest first.
    pub const ALL: [Rank; 8] = [
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Under,
        Rank::Over,
        Rank::King,
        Rank::Ace,
    ];

    /// The single wire character for this rank. Ten is `0` so every card
    /// token stays two characters long.
    pub fn symbol(self) -> char {
        match self {
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => '0',
            Rank::Under => 'J',
            Rank::Over => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '7' => Some(Rank::Seven),
            '8' => Some(Rank::Eight),
            '9' => Some(Rank::Nine),
            '0' => Some(Rank::Ten),
            'J' => Some(Rank::Under),
            'Q' => Some(Rank::Over),
            'K' => Some(Rank::King),
            'A' => Some(Rank::Ace),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A single playing card. Plain value: two cards are equal when suit and
/// rank are equal, and a standard deck holds each combination once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// True when `other` shares this card's suit or rank.
    pub fn matches(&self, other: &Card) -> bool {
        self.suit == other.suit || self.rank == other.rank
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.symbol(), self.rank.symbol())
    }
}

/// Parses a two-character wire token like `"K7"`.
///
/// Implementing `FromStr` lets callers write `"K7".parse::<Card>()`.
impl FromStr for Card {
    type Err = ProtocolError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut chars = token.chars();
        let (Some(s), Some(r), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ProtocolError::InvalidCard(token.to_string()));
        };
        match (Suit::from_symbol(s), Rank::from_symbol(r)) {
            (Some(suit), Some(rank)) => Ok(Card::new(suit, rank)),
            _ => Err(ProtocolError::InvalidCard(token.to_string())),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
