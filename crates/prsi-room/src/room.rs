//! A single room: seats, lifecycle state and the game it hosts.

use prsi_game::Game;
use prsi_protocol::{PlayerId, PlayerView, RoomId, RoomState, RoomSummary, RoomView};
use rand::Rng;

use crate::{RoomConfig, RoomError};

/// What a departure did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Nobody is left. The lobby should drop the room.
    Emptied,
    /// The game was running and now has at most one card holder, so it
    /// ended by forfeit. The room is Finished.
    EndedGame,
    /// Everything else: the room carries on.
    Stayed,
}

/// A room in the lobby.
///
/// The room only tracks *who* sits where. Starting the game is left to the
/// caller so the start can be broadcast from one place.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    state: RoomState,
    config: RoomConfig,
    /// Seating order. Also the turn order of the game.
    players: Vec<PlayerId>,
    game: Option<Game>,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            state: RoomState::Waiting,
            config,
            players: Vec::with_capacity(config.capacity),
            game: None,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Seated players in seating order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.capacity
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> Option<&mut Game> {
        self.game.as_mut()
    }

    /// Seats `player`.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] unless the room is Waiting.
    /// - [`RoomError::AlreadyInRoom`] if the player is already seated.
    /// - [`RoomError::RoomFull`] if every seat is taken.
    pub fn add_player(&mut self, player: PlayerId) -> Result<(), RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::InvalidState {
                room: self.id,
                state: self.state,
            });
        }
        if self.contains(player) {
            return Err(RoomError::AlreadyInRoom(player, self.id));
        }
        if self.is_full() {
            return Err(RoomError::RoomFull(self.id));
        }

        self.players.push(player);
        tracing::info!(
            room_id = %self.id,
            player_id = %player,
            players = self.players.len(),
            "player joined room"
        );
        Ok(())
    }

    /// Deals a new game to the seated players and moves to Playing.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] unless the room is Waiting, or the
    /// engine's error if the seating cannot make a game.
    pub fn start_game<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RoomError> {
        if !self.state.can_transition_to(RoomState::Playing) {
            return Err(RoomError::InvalidState {
                room: self.id,
                state: self.state,
            });
        }
        let game = Game::new(&self.players, self.config.hand_size, rng)?;
        self.game = Some(game);
        self.state = RoomState::Playing;
        tracing::info!(room_id = %self.id, players = self.players.len(), "game started");
        Ok(())
    }

    /// Unseats `player`. If a game is running, their cards go back to the
    /// deck and the game may end by forfeit.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the player is not seated.
    pub fn remove_player(&mut self, player: PlayerId) -> Result<Departure, RoomError> {
        let at = self
            .players
            .iter()
            .position(|p| *p == player)
            .ok_or(RoomError::NotInRoom(player, self.id))?;
        if self.state.is_active() {
            if let Some(game) = self.game.as_mut() {
                game.remove_player(player)?;
            }
        }
        self.players.remove(at);
        tracing::info!(
            room_id = %self.id,
            player_id = %player,
            players = self.players.len(),
            "player left room"
        );

        if self.players.is_empty() {
            if self.state.is_active() {
                self.state = RoomState::Finished;
            }
            return Ok(Departure::Emptied);
        }
        if self.conclude() {
            return Ok(Departure::EndedGame);
        }
        Ok(Departure::Stayed)
    }

    /// Moves a Playing room to Finished once its game is over.
    ///
    /// Returns `true` if this call made the transition.
    pub fn conclude(&mut self) -> bool {
        let over = self.game.as_ref().is_some_and(Game::is_finished);
        if self.state.is_active() && over {
            self.state = RoomState::Finished;
            tracing::info!(room_id = %self.id, "game finished");
            return true;
        }
        false
    }

    /// True when the room is empty, or when Playing with at most one card
    /// holder left.
    pub fn should_close(&self) -> bool {
        if self.players.is_empty() {
            return true;
        }
        self.state.is_active()
            && self
                .game
                .as_ref()
                .is_some_and(|game| game.still_playing() <= 1)
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            state: self.state,
        }
    }

    /// Builds the `ROOM` body. `describe` maps each seated player to how
    /// they should be shown; players it returns `None` for are left out.
    pub fn view(&self, mut describe: impl FnMut(PlayerId) -> Option<PlayerView>) -> RoomView {
        RoomView {
            id: self.id,
            state: self.state,
            players: self.players.iter().filter_map(|p| describe(*p)).collect(),
        }
    }
}
