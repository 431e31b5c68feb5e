//! One handler per client verb.
//!
//! Every handler first checks that the sender stands where the verb is
//! allowed. A mismatch is a [`PrsiError::Violation`] and costs the sender
//! the connection. Capacity rejections (`FAIL ...`) are ordinary replies.

use prsi_game::PassOutcome;
use prsi_protocol::{Card, ClientMessage, Command, PlayerId, RoomId, ServerMessage, StateView};
use prsi_session::Location;
use prsi_transport::ConnectionId;

use super::{Actor, Ending, ServerState};
use crate::PrsiError;

impl ServerState {
    /// Decodes one frame and runs its handler.
    pub(super) fn dispatch(&mut self, id: ConnectionId, tokens: &[String]) -> Result<(), PrsiError> {
        let message = self.session(id)?.decode(tokens)?;
        tracing::debug!(connection_id = %id, verb = message.verb(), "frame");

        match message {
            ClientMessage::Pong | ClientMessage::Ok => Ok(()),
            ClientMessage::Name(nickname) => self.handle_name(id, nickname),
            ClientMessage::ListRooms => self.handle_list_rooms(id),
            ClientMessage::JoinRoom(room) => self.handle_join_room(id, room),
            ClientMessage::CreateRoom => self.handle_create_room(id),
            ClientMessage::LeaveRoom => self.handle_leave_room(id),
            ClientMessage::RoomInfo => self.handle_room_info(id),
            ClientMessage::State => self.handle_state(id),
            ClientMessage::Play(card) => self.handle_play(id, card),
            ClientMessage::Draw => self.handle_draw(id),
            ClientMessage::Pass => self.handle_pass(id),
        }
    }

    // -- Preconditions -------------------------------------------------------

    fn in_lobby(&self, id: ConnectionId, verb: &str) -> Result<Actor, PrsiError> {
        let actor = self.actor(id, verb)?;
        match actor.location {
            Location::Lobby => Ok(actor),
            other => Err(PrsiError::Violation(format!("{verb} outside the lobby ({other:?})"))),
        }
    }

    fn in_room(&self, id: ConnectionId, verb: &str) -> Result<(Actor, RoomId), PrsiError> {
        let actor = self.actor(id, verb)?;
        match actor.location.room() {
            Some(room) => Ok((actor, room)),
            None => Err(PrsiError::Violation(format!("{verb} outside a room"))),
        }
    }

    /// The sender must be seated in a room whose game is running.
    fn in_game(&self, id: ConnectionId, verb: &str) -> Result<(Actor, RoomId), PrsiError> {
        let actor = self.actor(id, verb)?;
        let Location::Game(room) = actor.location else {
            return Err(PrsiError::Violation(format!("{verb} outside a game")));
        };
        let playing = self
            .lobby
            .get(room)
            .is_some_and(|r| r.state().is_active() && r.game().is_some());
        if !playing {
            return Err(PrsiError::Violation(format!("{verb} after the game ended")));
        }
        Ok((actor, room))
    }

    fn game_mut(&mut self, room: RoomId) -> Result<&mut prsi_game::Game, PrsiError> {
        self.lobby
            .get_mut(room)
            .and_then(|r| r.game_mut())
            .ok_or_else(|| PrsiError::Internal(format!("room {room} has no game")))
    }

    // -- Identity ------------------------------------------------------------

    /// `NAME <nick>`: registers a nickname, or reclaims a sleeping player
    /// who owns it.
    fn handle_name(&mut self, id: ConnectionId, nickname: String) -> Result<(), PrsiError> {
        if self.session(id)?.location() != Location::Unnamed {
            return Err(PrsiError::Violation("NAME sent twice".into()));
        }

        if let Some(owner) = self.sessions.find_by_nickname(&nickname) {
            let asleep = self.sessions.get(owner).is_some_and(|s| !s.is_awake());
            if !asleep {
                tracing::info!(connection_id = %id, %nickname, "nickname in use");
                self.reply(id, &ServerMessage::Fail(Command::Name));
                return Ok(());
            }

            let previous = self.sessions.reclaim(owner, id)?;
            self.closed.push(previous.id());
            self.reply(id, &ServerMessage::Ok(Command::Name));
            tracing::info!(from = %owner, to = %id, %nickname, "player reconnected");
            self.announce_wake(id);
            return Ok(());
        }

        let player = PlayerId(self.next_player);
        self.next_player += 1;
        self.sessions.name(id, player, &nickname)?;
        self.reply(id, &ServerMessage::Ok(Command::Name));
        Ok(())
    }

    // -- Lobby ---------------------------------------------------------------

    fn handle_list_rooms(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        self.in_lobby(id, "LIST_ROOMS")?;
        let rooms = self.lobby.summaries();
        self.reply(id, &ServerMessage::Rooms(rooms));
        Ok(())
    }

    fn handle_create_room(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let actor = self.in_lobby(id, "CREATE_ROOM")?;

        let room = match self.lobby.create_room() {
            Ok(room) => room,
            Err(e) => {
                tracing::info!(connection_id = %id, error = %e, "room not created");
                self.reply(id, &ServerMessage::Fail(Command::CreateRoom));
                return Ok(());
            }
        };
        if let Err(e) = self.lobby.room_mut(room)?.add_player(actor.player) {
            self.lobby.remove_room(room);
            return Err(e.into());
        }

        self.session_mut(id)?.set_location(Location::Room(room));
        self.reply(id, &ServerMessage::Ok(Command::CreateRoom));
        self.start_if_full(room)
    }

    fn handle_join_room(&mut self, id: ConnectionId, room: RoomId) -> Result<(), PrsiError> {
        let actor = self.in_lobby(id, "JOIN_ROOM")?;

        let joined = match self.lobby.get_mut(room) {
            Some(entry) => entry.add_player(actor.player).map_err(|e| e.to_string()),
            None => Err(format!("room {room} does not exist")),
        };
        if let Err(reason) = joined {
            tracing::info!(connection_id = %id, room_id = %room, %reason, "join refused");
            self.reply(id, &ServerMessage::Fail(Command::JoinRoom));
            return Ok(());
        }

        self.session_mut(id)?.set_location(Location::Room(room));
        self.reply(id, &ServerMessage::Ok(Command::JoinRoom));
        self.broadcast(room, &ServerMessage::Join(actor.nickname), Some(actor.player));
        self.start_if_full(room)
    }

    /// Deals the game once the last seat is taken: `GAME_START` to all,
    /// each player's `HAND`, then `TURN` to all.
    fn start_if_full(&mut self, room: RoomId) -> Result<(), PrsiError> {
        let entry = self.lobby.room_mut(room)?;
        if !entry.is_full() || !entry.state().is_joinable() {
            return Ok(());
        }
        entry.start_game(&mut self.rng)?;

        let players = entry.players().to_vec();
        for &player in &players {
            if let Some(session) = self
                .sessions
                .find_by_player(player)
                .and_then(|conn| self.sessions.get_mut(conn))
            {
                session.set_location(Location::Game(room));
            }
        }

        self.broadcast(room, &ServerMessage::GameStart, None);
        for player in players {
            let hand = self
                .lobby
                .get(room)
                .and_then(|r| r.game())
                .and_then(|g| g.hand(player))
                .map(<[Card]>::to_vec)
                .unwrap_or_default();
            self.sessions.send_to_player(player, &ServerMessage::Hand(hand));
        }
        self.broadcast_turn(room);
        Ok(())
    }

    // -- Room ----------------------------------------------------------------

    fn handle_leave_room(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let (actor, room) = self.in_room(id, "LEAVE_ROOM")?;

        self.depart(&actor, room)?;
        self.session_mut(id)?.set_location(Location::Lobby);
        self.reply(id, &ServerMessage::Ok(Command::LeaveRoom));
        Ok(())
    }

    fn handle_room_info(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let (_, room) = self.in_room(id, "ROOM_INFO")?;
        let view = self
            .room_view(room)
            .ok_or_else(|| PrsiError::Internal(format!("room {room} vanished")))?;
        self.reply(id, &ServerMessage::Room(view));
        Ok(())
    }

    /// `STATE`: a snapshot of wherever the sender stands. Allowed anywhere.
    fn handle_state(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let session = self.session(id)?;
        let location = session.location();
        let player = session.player();

        let view = match location {
            Location::Unnamed => StateView::Unnamed,
            Location::Lobby => StateView::Lobby,
            Location::Room(room) | Location::Game(room) => {
                let view = self
                    .room_view(room)
                    .ok_or_else(|| PrsiError::Internal(format!("room {room} vanished")))?;
                match location {
                    Location::Game(_) => {
                        let game = self.lobby.get(room).and_then(|r| r.game());
                        let hand = match (game, player) {
                            (Some(game), Some(player)) => {
                                game.hand(player).map(<[Card]>::to_vec).unwrap_or_default()
                            }
                            _ => Vec::new(),
                        };
                        StateView::Game {
                            room: view,
                            hand,
                            turn: self.turn_view(room),
                        }
                    }
                    _ => StateView::Room(view),
                }
            }
        };
        self.reply(id, &ServerMessage::State(view));
        Ok(())
    }

    // -- Game ----------------------------------------------------------------

    /// `PLAY <card>`: `OK PLAY` to the player, `PLAYED` to the others, `WIN`
    /// if the hand is now empty, then either the next `TURN` or the end of
    /// the game.
    fn handle_play(&mut self, id: ConnectionId, card: Card) -> Result<(), PrsiError> {
        let (actor, room) = self.in_game(id, "PLAY")?;
        let outcome = self.game_mut(room)?.play_card(actor.player, card)?;
        tracing::info!(room_id = %room, nickname = %actor.nickname, %card, "card played");

        self.reply(id, &ServerMessage::Ok(Command::Play));
        self.broadcast(
            room,
            &ServerMessage::Played {
                nickname: actor.nickname.clone(),
                card,
            },
            Some(actor.player),
        );
        if outcome.emptied_hand {
            self.reply(id, &ServerMessage::Win);
        }

        if outcome.finished {
            self.finish_game(room, Ending::Played);
        } else {
            self.broadcast_turn(room);
        }
        Ok(())
    }

    /// `DRAW`: the drawn card to the player, `DRAWED` to the others.
    fn handle_draw(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let (actor, room) = self.in_game(id, "DRAW")?;
        let outcome = self.game_mut(room)?.draw_card(actor.player)?;

        self.announce_draw(id, &actor, room, outcome.cards);
        self.broadcast_turn(room);
        Ok(())
    }

    /// `PASS`: gives in to a pending Ace (`SKIP`) or Seven chain (the
    /// penalty cards, announced like a draw).
    fn handle_pass(&mut self, id: ConnectionId) -> Result<(), PrsiError> {
        let (actor, room) = self.in_game(id, "PASS")?;

        match self.game_mut(room)?.pass(actor.player)? {
            PassOutcome::Skipped => {
                self.broadcast(room, &ServerMessage::Skip(actor.nickname.clone()), None);
            }
            PassOutcome::Drew(cards) => self.announce_draw(id, &actor, room, cards),
        }
        self.broadcast_turn(room);
        Ok(())
    }

    fn announce_draw(&mut self, id: ConnectionId, actor: &Actor, room: RoomId, cards: Vec<Card>) {
        let count = cards.len();
        tracing::debug!(room_id = %room, nickname = %actor.nickname, count, "cards drawn");
        self.reply(id, &ServerMessage::Cards(cards));
        self.broadcast(
            room,
            &ServerMessage::Drawed {
                nickname: actor.nickname.clone(),
                count,
            },
            Some(actor.player),
        );
    }
}
