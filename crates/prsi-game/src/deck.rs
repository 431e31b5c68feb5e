//! Pure functions over collections of cards.

use prsi_protocol::{Card, Rank, Suit};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Number of cards in a Prsi deck.
pub const DECK_SIZE: usize = 32;

/// All 32 cards, suit by suit, lowest rank first.
pub fn standard_deck() -> Vec<Card> {
    Suit::ALL
        .iter()
        .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card::new(suit, rank)))
        .collect()
}

/// A full deck in random order.
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut cards = standard_deck();
    cards.shuffle(rng);
    cards
}

/// `true` if `cards` is exactly one standard deck in any order: 32 cards,
/// no duplicates.
pub fn is_complete(cards: &[Card]) -> bool {
    let unique: HashSet<&Card> = cards.iter().collect();
    cards.len() == DECK_SIZE && unique.len() == DECK_SIZE
}

/// Removes one copy of `card` from `cards`, keeping the order of the rest.
pub fn take(cards: &mut Vec<Card>, card: Card) -> Option<Card> {
    let at = cards.iter().position(|c| *c == card)?;
    Some(cards.remove(at))
}
