//! One game of Prsi.
//!
//! ```text
//! Setup (Game::new) ──→ Active ──(≤ 1 player holds cards)──→ Finished
//! ```
//!
//! Rules in short:
//!
//! - A card is legal if it shares suit or rank with the top card. The Over
//!   ("Menic") is legal on anything.
//! - An Ace blocks the next player: they must answer with an Ace or pass
//!   (losing the turn).
//! - A Seven makes the next player draw two: they must answer with a Seven
//!   (pushing +2 more onto whoever comes after) or pass and draw the lot.
//! - Emptying your hand puts you on the leaderboard and out of rotation.

use prsi_protocol::{Card, PlayerId, Rank};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{deck, GameError};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The effect the top card still has on the next player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// An Ace: answer with an Ace or pass.
    Skip,
    /// One or more stacked Sevens: answer with a Seven or draw this many.
    Draw(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Active,
    Finished,
}

/// What happened after a successful [`Game::play_card`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    /// The player's hand is now empty; they were added to the leaderboard.
    pub emptied_hand: bool,
    /// The game ended with this play.
    pub finished: bool,
}

/// What happened after a successful [`Game::draw_card`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    /// The drawn card, or nothing when deck and pile are both exhausted.
    pub cards: Vec<Card>,
}

/// What happened after a successful [`Game::pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// An Ace block was absorbed.
    Skipped,
    /// A Seven chain was paid off with these cards.
    Drew(Vec<Card>),
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Seat {
    player: PlayerId,
    hand: Vec<Card>,
}

/// A running game.
///
/// Card conservation: `deck + pile + top + every hand` is always exactly
/// the 32-card deck. Cards only move between those places.
#[derive(Debug, Clone)]
pub struct Game {
    /// Drawable cards; the end of the vector is the top.
    deck: Vec<Card>,
    /// Played cards under `top`, oldest first.
    pile: Vec<Card>,
    top: Card,
    seats: Vec<Seat>,
    /// Index into `seats` of the player on turn.
    current: usize,
    penalty: Option<Penalty>,
    /// Players in the order their hands became empty.
    leaderboard: Vec<PlayerId>,
    phase: GamePhase,
    rng: StdRng,
}

impl Game {
    /// Shuffles a fresh deck, deals `hand_size` cards to each player in
    /// seating order and flips the first top card.
    ///
    /// If the deck is too small for `hand_size`, every hand is shrunk so
    /// that at least one card stays in the deck. The initial top card has
    /// no effect even if it is an Ace or a Seven.
    ///
    /// # Errors
    /// [`GameError::NotEnoughPlayers`] for fewer than two players and
    /// [`GameError::TooManyPlayers`] when one card each does not fit.
    pub fn new<R: Rng + ?Sized>(
        players: &[PlayerId],
        hand_size: usize,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let count = players.len();
        if count < 2 {
            return Err(GameError::NotEnoughPlayers(count));
        }
        // Dealt cards + the top card must leave the deck non-empty.
        let fits = (deck::DECK_SIZE - 2) / count;
        if fits == 0 {
            return Err(GameError::TooManyPlayers(count));
        }
        let hand_size = hand_size.clamp(1, fits);

        let mut cards = deck::shuffled_deck(rng);
        let mut seats: Vec<Seat> = players
            .iter()
            .map(|&player| Seat { player, hand: Vec::with_capacity(hand_size) })
            .collect();
        for _ in 0..hand_size {
            for seat in &mut seats {
                if let Some(card) = cards.pop() {
                    seat.hand.push(card);
                }
            }
        }
        let top = cards.pop().ok_or(GameError::TooManyPlayers(count))?;

        tracing::debug!(players = count, hand_size, %top, "game dealt");

        Ok(Self {
            deck: cards,
            pile: Vec::new(),
            top,
            seats,
            current: 0,
            penalty: None,
            leaderboard: Vec::new(),
            phase: GamePhase::Active,
            rng: StdRng::seed_from_u64(rng.random()),
        })
    }

    /// Builds a game from a fixed position: hands in seating order, the top
    /// card and the drawable deck (last element drawn first). The first
    /// seat with cards is on turn.
    ///
    /// Useful for replays and tests; no check is made that the cards form
    /// a complete deck.
    pub fn from_position(
        hands: Vec<(PlayerId, Vec<Card>)>,
        top: Card,
        deck: Vec<Card>,
        seed: u64,
    ) -> Self {
        let seats: Vec<Seat> = hands
            .into_iter()
            .map(|(player, hand)| Seat { player, hand })
            .collect();
        let mut game = Self {
            deck,
            pile: Vec::new(),
            top,
            seats,
            current: 0,
            penalty: None,
            leaderboard: Vec::new(),
            phase: GamePhase::Active,
            rng: StdRng::seed_from_u64(seed),
        };
        game.settle_turn();
        game
    }

    // -- Queries -----------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Finished
    }

    /// The card every play is matched against.
    pub fn top(&self) -> Card {
        self.top
    }

    pub fn penalty(&self) -> Option<Penalty> {
        self.penalty
    }

    /// Player on turn, `None` once the game is finished.
    pub fn current_player(&self) -> Option<PlayerId> {
        match self.phase {
            GamePhase::Active => self.seats.get(self.current).map(|s| s.player),
            GamePhase::Finished => None,
        }
    }

    /// The player's hand, or `None` if they are not seated.
    pub fn hand(&self, player: PlayerId) -> Option<&[Card]> {
        self.seat_of(player).map(|i| self.seats[i].hand.as_slice())
    }

    /// Seated players in seating order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats.iter().map(|s| s.player)
    }

    /// Number of seated players that still hold cards.
    pub fn still_playing(&self) -> usize {
        self.seats.iter().filter(|s| !s.hand.is_empty()).count()
    }

    /// Players in the order their hands became empty.
    pub fn leaderboard(&self) -> &[PlayerId] {
        &self.leaderboard
    }

    /// Final ranking: the leaderboard, then everyone still holding cards in
    /// seating order.
    pub fn standings(&self) -> Vec<PlayerId> {
        let mut order = self.leaderboard.clone();
        order.extend(
            self.seats
                .iter()
                .filter(|s| !s.hand.is_empty())
                .map(|s| s.player),
        );
        order
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    /// Every card the game holds: deck, pile, top and all hands.
    pub fn all_cards(&self) -> Vec<Card> {
        let mut cards = self.deck.clone();
        cards.extend_from_slice(&self.pile);
        cards.push(self.top);
        for seat in &self.seats {
            cards.extend_from_slice(&seat.hand);
        }
        cards
    }

    /// Whether `card` may be played on the current top.
    pub fn is_valid_play(&self, card: Card) -> bool {
        match self.penalty {
            Some(Penalty::Skip) => card.rank == Rank::Ace,
            Some(Penalty::Draw(_)) => card.rank == Rank::Seven,
            None => card.rank == Rank::Over || card.matches(&self.top),
        }
    }

    /// The player who would be on turn after `from`, skipping empty hands.
    ///
    /// Returns `from` itself when at most one player still holds cards.
    pub fn next_player(&self, from: PlayerId) -> Option<PlayerId> {
        let at = self.seat_of(from)?;
        Some(self.seats[self.next_seat(at)].player)
    }

    // -- Actions -----------------------------------------------------------

    /// Plays `card` from `player`'s hand.
    ///
    /// # Errors
    /// Wrong turn, card not held, or card not legal on the top.
    pub fn play_card(&mut self, player: PlayerId, card: Card) -> Result<PlayOutcome, GameError> {
        let at = self.ensure_turn(player)?;
        if !self.seats[at].hand.contains(&card) {
            return Err(GameError::CardNotInHand(card));
        }
        if !self.is_valid_play(card) {
            return Err(GameError::IllegalCard { card, top: self.top });
        }

        deck::take(&mut self.seats[at].hand, card);
        self.pile.push(self.top);
        self.top = card;

        self.penalty = match card.rank {
            Rank::Ace => Some(Penalty::Skip),
            Rank::Seven => {
                let stacked = match self.penalty {
                    Some(Penalty::Draw(n)) => n,
                    _ => 0,
                };
                Some(Penalty::Draw(stacked + 2))
            }
            _ => None,
        };

        let emptied_hand = self.seats[at].hand.is_empty();
        if emptied_hand {
            self.leaderboard.push(player);
            tracing::debug!(%player, "hand emptied");
        }
        self.advance();

        Ok(PlayOutcome {
            emptied_hand,
            finished: self.is_finished(),
        })
    }

    /// Draws one card and passes the turn.
    ///
    /// # Errors
    /// Wrong turn, or an Ace/Seven effect is pending.
    pub fn draw_card(&mut self, player: PlayerId) -> Result<DrawOutcome, GameError> {
        let at = self.ensure_turn(player)?;
        if self.penalty.is_some() {
            return Err(GameError::PenaltyPending);
        }
        let cards = self.take_from_deck(1);
        self.seats[at].hand.extend_from_slice(&cards);
        self.advance();
        Ok(DrawOutcome { cards })
    }

    /// Accepts the pending effect and passes the turn.
    ///
    /// # Errors
    /// Wrong turn, or nothing is pending.
    pub fn pass(&mut self, player: PlayerId) -> Result<PassOutcome, GameError> {
        let at = self.ensure_turn(player)?;
        let outcome = match self.penalty.take() {
            None => return Err(GameError::NothingToPass),
            Some(Penalty::Skip) => PassOutcome::Skipped,
            Some(Penalty::Draw(count)) => {
                let cards = self.take_from_deck(count);
                self.seats[at].hand.extend_from_slice(&cards);
                PassOutcome::Drew(cards)
            }
        };
        self.advance();
        Ok(outcome)
    }

    /// Takes `player` out of the game. Their cards go back under the deck;
    /// if it was their turn, the turn (and any pending effect) moves on.
    ///
    /// # Errors
    /// [`GameError::NotSeated`] if the player has no seat.
    pub fn remove_player(&mut self, player: PlayerId) -> Result<(), GameError> {
        let at = self.seat_of(player).ok_or(GameError::NotSeated(player))?;
        let seat = self.seats.remove(at);
        self.deck.splice(0..0, seat.hand);

        if self.phase == GamePhase::Finished {
            return Ok(());
        }
        if at < self.current {
            self.current -= 1;
        } else if at == self.current && !self.seats.is_empty() {
            // The seat after the leaver slid into `at`.
            self.current = at % self.seats.len();
        }
        self.settle_turn();
        Ok(())
    }

    // -- Internals ---------------------------------------------------------

    fn seat_of(&self, player: PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| s.player == player)
    }

    fn ensure_turn(&self, player: PlayerId) -> Result<usize, GameError> {
        if self.phase == GamePhase::Finished {
            return Err(GameError::Finished);
        }
        let at = self.seat_of(player).ok_or(GameError::NotSeated(player))?;
        if at != self.current {
            return Err(GameError::NotYourTurn(player));
        }
        Ok(at)
    }

    fn next_seat(&self, from: usize) -> usize {
        if self.still_playing() <= 1 {
            return from;
        }
        let n = self.seats.len();
        let mut at = from;
        for _ in 0..n {
            at = (at + 1) % n;
            if !self.seats[at].hand.is_empty() {
                return at;
            }
        }
        from
    }

    fn advance(&mut self) {
        if self.still_playing() <= 1 {
            self.finish();
        } else {
            self.current = self.next_seat(self.current);
        }
    }

    /// Makes sure the turn sits on a player with cards, or ends the game.
    fn settle_turn(&mut self) {
        if self.still_playing() <= 1 {
            self.finish();
        } else if self.seats[self.current].hand.is_empty() {
            self.current = self.next_seat(self.current);
        }
    }

    fn finish(&mut self) {
        if self.phase != GamePhase::Finished {
            self.phase = GamePhase::Finished;
            self.penalty = None;
            tracing::debug!(standings = ?self.standings(), "game finished");
        }
    }

    /// Draws up to `count` cards, recycling the pile (under the top card)
    /// into a reshuffled deck whenever the deck runs dry.
    fn take_from_deck(&mut self, count: usize) -> Vec<Card> {
        let mut cards = Vec::with_capacity(count);
        for _ in 0..count {
            if self.deck.is_empty() {
                if self.pile.is_empty() {
                    break;
                }
                self.deck.append(&mut self.pile);
                self.deck.shuffle(&mut self.rng);
                tracing::debug!(cards = self.deck.len(), "pile recycled into deck");
            }
            if let Some(card) = self.deck.pop() {
                cards.push(card);
            }
        }
        cards
    }
}

// =========================================================================
// Tests
// =========================================================================
