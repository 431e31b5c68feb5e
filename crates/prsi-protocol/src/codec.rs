//! Codec trait and the line-oriented text codec.
//!
//! Every frame on the wire looks like
//!
//! ```text
//! PRSI <verb> [args...] |\n
//! ```
//!
//! `PRSI` (the magic) and `|` (the delimiter) are fixed sentinels. They
//! are stripped from the parsed token list. The codec itself is stateless:
//! the growing read buffer belongs to the session, the codec only looks at
//! it and removes what it consumed.

use std::fmt::{self, Write as _};

use crate::{
    Card, ClientMessage, ProtocolError, RoomId, RoomView, ServerMessage, StateView,
};

/// First token of every frame.
pub const MAGIC: &str = "PRSI";

/// Last token of every frame.
pub const DELIM: &str = "|";

/// Longest nickname the server accepts.
const MAX_NICKNAME_LEN: usize = 20;

/// A codec that frames raw bytes into token lists and renders outgoing
/// messages.
///
/// - `Send + Sync + 'static` → a codec can live inside a session that is
///   owned by a long-running server task.
///
/// The checks are split in three so the session can tell "wait for more
/// bytes" apart from "this connection is sending garbage":
///
/// 1. [`could_be_valid`](Codec::could_be_valid): is there enough to judge?
/// 2. [`is_well_formed`](Codec::is_well_formed): does it start correctly?
/// 3. [`extract_frame`](Codec::extract_frame): is a whole frame there?
pub trait Codec: Send + Sync + 'static {
    /// Cheap pre-check: `false` for empty or too-short buffers that cannot
    /// be judged yet.
    fn could_be_valid(&self, buffer: &[u8]) -> bool;

    /// `true` iff, after leading whitespace, the buffer starts with the
    /// magic. A `false` here (once [`could_be_valid`](Codec::could_be_valid)
    /// holds) is a protocol violation, not a partial read.
    fn is_well_formed(&self, buffer: &[u8]) -> bool;

    /// Removes one complete frame from the front of `buffer` and returns its
    /// tokens. Returns `Ok(None)` and leaves the buffer untouched when no
    /// delimiter has arrived yet.
    ///
    /// # Errors
    /// [`ProtocolError::NotText`] if the frame body is not UTF-8. The bad
    /// frame is still consumed.
    fn extract_frame(
        &self,
        buffer: &mut Vec<u8>,
    ) -> Result<Option<Vec<String>>, ProtocolError>;

    /// Turns the tokens of one frame into a [`ClientMessage`].
    ///
    /// # Errors
    /// Unknown verbs, wrong argument counts and unparsable arguments.
    fn decode(&self, tokens: &[String]) -> Result<ClientMessage, ProtocolError>;

    /// Renders a message as one complete line, newline included.
    fn encode(&self, message: &ServerMessage) -> String;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The [`Codec`] spoken by Prsi clients: ASCII tokens separated by
/// whitespace between `PRSI` and `|`.
///
/// ```rust
/// use prsi_protocol::{ClientMessage, Codec, TextCodec};
///
/// let codec = TextCodec;
/// let mut buffer = b" PRSI NAME alice | PRSI LIST_ROOMS |\n".to_vec();
///
/// let first = codec.extract_frame(&mut buffer).unwrap().unwrap();
/// assert_eq!(codec.decode(&first).unwrap(), ClientMessage::Name("alice".into()));
///
/// let second = codec.extract_frame(&mut buffer).unwrap().unwrap();
/// assert_eq!(codec.decode(&second).unwrap(), ClientMessage::ListRooms);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn could_be_valid(&self, buffer: &[u8]) -> bool {
        !buffer.is_empty() && buffer.len() > leading_whitespace(buffer) + MAGIC.len()
    }

    fn is_well_formed(&self, buffer: &[u8]) -> bool {
        buffer[leading_whitespace(buffer)..].starts_with(MAGIC.as_bytes())
    }

    fn extract_frame(
        &self,
        buffer: &mut Vec<u8>,
    ) -> Result<Option<Vec<String>>, ProtocolError> {
        let Some(delim_at) = buffer
            .windows(DELIM.len())
            .position(|window| window == DELIM.as_bytes())
        else {
            return Ok(None);
        };

        let mut consumed = delim_at + DELIM.len();
        let rest = &buffer[consumed..];
        if rest.starts_with(b"\r\n") {
            consumed += 2;
        } else if rest.starts_with(b"\n") {
            consumed += 1;
        }

        let tokens = std::str::from_utf8(&buffer[..delim_at]).map(|body| {
            body.split_whitespace()
                .filter(|token| *token != MAGIC)
                .map(str::to_owned)
                .collect::<Vec<_>>()
        });
        buffer.drain(..consumed);

        tokens.map(Some).map_err(|_| ProtocolError::NotText)
    }

    fn decode(&self, tokens: &[String]) -> Result<ClientMessage, ProtocolError> {
        let (verb, args) = tokens.split_first().ok_or(ProtocolError::EmptyFrame)?;

        let message = match verb.as_str() {
            // Acknowledgements from older clients carry arbitrary arguments.
            "OK" => ClientMessage::Ok,
            "PONG" => {
                expect_args(verb, args, 0)?;
                ClientMessage::Pong
            }
            "NAME" => {
                expect_args(verb, args, 1)?;
                ClientMessage::Name(parse_nickname(verb, &args[0])?)
            }
            "LIST_ROOMS" => {
                expect_args(verb, args, 0)?;
                ClientMessage::ListRooms
            }
            "JOIN_ROOM" => {
                expect_args(verb, args, 1)?;
                let id = args[0].parse::<u64>().map_err(|_| {
                    ProtocolError::InvalidArgument {
                        verb: verb.clone(),
                        value: args[0].clone(),
                    }
                })?;
                ClientMessage::JoinRoom(RoomId(id))
            }
            "CREATE_ROOM" => {
                expect_args(verb, args, 0)?;
                ClientMessage::CreateRoom
            }
            "LEAVE_ROOM" => {
                expect_args(verb, args, 0)?;
                ClientMessage::LeaveRoom
            }
            "ROOM_INFO" => {
                expect_args(verb, args, 0)?;
                ClientMessage::RoomInfo
            }
            "STATE" => {
                expect_args(verb, args, 0)?;
                ClientMessage::State
            }
            "PLAY" => {
                expect_args(verb, args, 1)?;
                ClientMessage::Play(args[0].parse::<Card>()?)
            }
            "DRAW" => {
                expect_args(verb, args, 0)?;
                ClientMessage::Draw
            }
            "PASS" => {
                expect_args(verb, args, 0)?;
                ClientMessage::Pass
            }
            _ => return Err(ProtocolError::UnknownVerb(verb.clone())),
        };
        Ok(message)
    }

    fn encode(&self, message: &ServerMessage) -> String {
        let mut line = String::from(MAGIC);
        render(&mut line, message);
        line.push(' ');
        line.push_str(DELIM);
        line.push('\n');
        line
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn leading_whitespace(buffer: &[u8]) -> usize {
    buffer.iter().take_while(|b| b.is_ascii_whitespace()).count()
}

fn expect_args(verb: &str, args: &[String], expected: usize) -> Result<(), ProtocolError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::WrongArity {
            verb: verb.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn parse_nickname(verb: &str, nick: &str) -> Result<String, ProtocolError> {
    let valid = !nick.is_empty()
        && nick.len() <= MAX_NICKNAME_LEN
        && nick != MAGIC
        && !nick.contains(DELIM)
        && nick.chars().all(|c| c.is_ascii_graphic());
    if valid {
        Ok(nick.to_string())
    } else {
        Err(ProtocolError::InvalidArgument {
            verb: verb.to_string(),
            value: nick.to_string(),
        })
    }
}

/// Appends ` <value>` to the line. Writing into a `String` cannot fail.
fn push(line: &mut String, value: impl fmt::Display) {
    let _ = write!(line, " {value}");
}

fn push_cards(line: &mut String, cards: &[Card]) {
    push(line, cards.len());
    for card in cards {
        push(line, card);
    }
}

fn push_room(line: &mut String, room: &RoomView) {
    push(line, "ROOM");
    push(line, room.id.0);
    push(line, room.state);
    push(line, "PLAYERS");
    push(line, room.players.len());
    for player in &room.players {
        push(line, &player.nickname);
        push(line, if player.awake { "awake" } else { "sleep" });
    }
}

fn render(line: &mut String, message: &ServerMessage) {
    match message {
        ServerMessage::Ping => push(line, "PING"),
        ServerMessage::Ok(command) => {
            push(line, "OK");
            push(line, command);
        }
        ServerMessage::Fail(command) => {
            push(line, "FAIL");
            push(line, command);
        }
        ServerMessage::Rooms(rooms) => {
            push(line, "ROOMS");
            push(line, rooms.len());
            for room in rooms {
                push(line, room.id.0);
                push(line, room.state);
            }
        }
        ServerMessage::Room(room) => push_room(line, room),
        ServerMessage::Join(nick) => {
            push(line, "JOIN");
            push(line, nick);
        }
        ServerMessage::Leave(nick) => {
            push(line, "LEAVE");
            push(line, nick);
        }
        ServerMessage::GameStart => push(line, "GAME_START"),
        ServerMessage::Hand(cards) => {
            push(line, "HAND");
            push_cards(line, cards);
        }
        ServerMessage::Turn(turn) => {
            push(line, "TURN");
            push(line, &turn.nickname);
            push(line, "TOP");
            push(line, turn.top);
        }
        ServerMessage::Played { nickname, card } => {
            push(line, "PLAYED");
            push(line, nickname);
            push(line, card);
        }
        ServerMessage::Skip(nick) => {
            push(line, "SKIP");
            push(line, nick);
        }
        ServerMessage::Drawed { nickname, count } => {
            push(line, "DRAWED");
            push(line, nickname);
            push(line, count);
        }
        ServerMessage::Cards(cards) => {
            push(line, "CARDS");
            push_cards(line, cards);
        }
        ServerMessage::Win => push(line, "WIN"),
        ServerMessage::Lose => push(line, "LOSE"),
        ServerMessage::Leaderboard(nicks) => {
            push(line, "LEADERBOARD");
            push(line, nicks.len());
            for nick in nicks {
                push(line, nick);
            }
        }
        ServerMessage::Sleep(nick) => {
            push(line, "SLEEP");
            push(line, nick);
        }
        ServerMessage::Awake(nick) => {
            push(line, "AWAKE");
            push(line, nick);
        }
        ServerMessage::Dead(nick) => {
            push(line, "DEAD");
            push(line, nick);
        }
        ServerMessage::State(state) => {
            push(line, "STATE");
            match state {
                StateView::Unnamed => push(line, "UNNAMED"),
                StateView::Lobby => push(line, "LOBBY"),
                StateView::Room(room) => {
                    push(line, "ROOM");
                    push_room(line, room);
                }
                StateView::Game { room, hand, turn } => {
                    push(line, "GAME");
                    push_room(line, room);
                    push(line, "HAND");
                    push_cards(line, hand);
                    if let Some(turn) = turn {
                        push(line, "TURN");
                        push(line, &turn.nickname);
                        push(line, "TOP");
                        push(line, turn.top);
                    }
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, PlayerView, Rank, RoomState, RoomSummary, Suit, TurnView};

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    /// Encodes, checks the framing, and returns the body tokens.
    fn body(message: &ServerMessage) -> Vec<String> {
        let line = TextCodec.encode(message);
        assert!(line.starts_with("PRSI "), "missing magic: {line:?}");
        assert!(line.ends_with(" |\n"), "missing delimiter: {line:?}");
        let mut buffer = line.into_bytes();
        let parsed = TextCodec.extract_frame(&mut buffer).unwrap().unwrap();
        assert!(buffer.is_empty());
        parsed
    }

    // =====================================================================
    // Pre-checks
    // =====================================================================

    #[test]
    fn test_could_be_valid_rejects_empty_and_short_buffers() {
        assert!(!TextCodec.could_be_valid(b""));
        assert!(!TextCodec.could_be_valid(b"PRSI"));
        assert!(!TextCodec.could_be_valid(b"    PRS"));
        assert!(!TextCodec.could_be_valid(b"   \n  "));
    }

    #[test]
    fn test_could_be_valid_accepts_magic_plus_one_byte() {
        assert!(TextCodec.could_be_valid(b"PRSI "));
        assert!(TextCodec.could_be_valid(b"  garbage"));
    }

    #[test]
    fn test_is_well_formed_skips_leading_whitespace() {
        assert!(TextCodec.is_well_formed(b"  \r\n PRSI NAME x |"));
        assert!(TextCodec.is_well_formed(b"PRSI"));
    }

    #[test]
    fn test_is_well_formed_rejects_other_prefix() {
        assert!(!TextCodec.is_well_formed(b"GET / HTTP/1.1"));
        assert!(!TextCodec.is_well_formed(b" prsi NAME x |"));
    }

    // =====================================================================
    // extract_frame
    // =====================================================================

    #[test]
    fn test_extract_frame_two_concatenated_frames_yields_two_and_empties_buffer() {
        let mut buffer = b"PRSI NAME alice |\nPRSI JOIN_ROOM 3 |\n".to_vec();

        let first = TextCodec.extract_frame(&mut buffer).unwrap();
        let second = TextCodec.extract_frame(&mut buffer).unwrap();
        let third = TextCodec.extract_frame(&mut buffer).unwrap();

        assert_eq!(first, Some(tokens(&["NAME", "alice"])));
        assert_eq!(second, Some(tokens(&["JOIN_ROOM", "3"])));
        assert_eq!(third, None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_extract_frame_partial_leaves_buffer_unchanged() {
        let mut buffer = b"PRSI NAME ali".to_vec();
        let before = buffer.clone();

        assert_eq!(TextCodec.extract_frame(&mut buffer).unwrap(), None);
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_extract_frame_keeps_bytes_of_next_partial_frame() {
        let mut buffer = b"PRSI DRAW |\r\nPRSI PL".to_vec();

        let frame = TextCodec.extract_frame(&mut buffer).unwrap();

        assert_eq!(frame, Some(tokens(&["DRAW"])));
        assert_eq!(buffer, b"PRSI PL".to_vec());
    }

    #[test]
    fn test_extract_frame_without_newline_leaves_trailing_space() {
        // The reference client sends " PRSI <cmd> | " with no newline.
        let mut buffer = b" PRSI PONG | ".to_vec();

        let frame = TextCodec.extract_frame(&mut buffer).unwrap();

        assert_eq!(frame, Some(tokens(&["PONG"])));
        assert_eq!(buffer, b" ".to_vec());
        assert!(!TextCodec.could_be_valid(&buffer));
    }

    #[test]
    fn test_extract_frame_empty_body_yields_empty_token_list() {
        let mut buffer = b"PRSI |\n".to_vec();
        assert_eq!(TextCodec.extract_frame(&mut buffer).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_extract_frame_invalid_utf8_is_consumed_and_reported() {
        let mut buffer = b"PRSI NAME \xff\xfe |\nPRSI PONG |\n".to_vec();

        let result = TextCodec.extract_frame(&mut buffer);

        assert_eq!(result, Err(ProtocolError::NotText));
        assert_eq!(buffer, b"PRSI PONG |\n".to_vec());
    }

    // =====================================================================
    // decode
    // =====================================================================

    #[test]
    fn test_decode_every_client_verb() {
        let cases = [
            (vec!["PONG"], ClientMessage::Pong),
            (vec!["NAME", "bob"], ClientMessage::Name("bob".into())),
            (vec!["LIST_ROOMS"], ClientMessage::ListRooms),
            (vec!["JOIN_ROOM", "4"], ClientMessage::JoinRoom(RoomId(4))),
            (vec!["CREATE_ROOM"], ClientMessage::CreateRoom),
            (vec!["LEAVE_ROOM"], ClientMessage::LeaveRoom),
            (vec!["ROOM_INFO"], ClientMessage::RoomInfo),
            (vec!["STATE"], ClientMessage::State),
            (
                vec!["PLAY", "LA"],
                ClientMessage::Play(Card::new(Suit::Spades, Rank::Ace)),
            ),
            (vec!["DRAW"], ClientMessage::Draw),
            (vec!["PASS"], ClientMessage::Pass),
        ];
        for (words, expected) in cases {
            assert_eq!(TextCodec.decode(&tokens(&words)).unwrap(), expected);
        }
    }

    #[test]
    fn test_decode_ok_is_accepted_with_any_arguments() {
        assert_eq!(TextCodec.decode(&tokens(&["OK"])).unwrap(), ClientMessage::Ok);
        assert_eq!(
            TextCodec.decode(&tokens(&["OK", "PING"])).unwrap(),
            ClientMessage::Ok
        );
    }

    #[test]
    fn test_decode_unknown_verb_fails() {
        assert_eq!(
            TextCodec.decode(&tokens(&["HELLO"])),
            Err(ProtocolError::UnknownVerb("HELLO".into()))
        );
    }

    #[test]
    fn test_decode_wrong_arity_fails() {
        assert_eq!(
            TextCodec.decode(&tokens(&["NAME"])),
            Err(ProtocolError::WrongArity {
                verb: "NAME".into(),
                expected: 1,
                got: 0,
            })
        );
        assert!(TextCodec.decode(&tokens(&["DRAW", "now"])).is_err());
        assert!(TextCodec.decode(&tokens(&["NAME", "a", "b"])).is_err());
    }

    #[test]
    fn test_decode_join_room_with_non_numeric_id_fails() {
        assert!(matches!(
            TextCodec.decode(&tokens(&["JOIN_ROOM", "-1"])),
            Err(ProtocolError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_decode_play_with_bad_card_fails() {
        assert_eq!(
            TextCodec.decode(&tokens(&["PLAY", "S1"])),
            Err(ProtocolError::InvalidCard("S1".into()))
        );
    }

    #[test]
    fn test_decode_name_rejects_magic_and_oversized_nicks() {
        assert!(TextCodec.decode(&tokens(&["NAME", "PRSI"])).is_err());
        let long = "x".repeat(MAX_NICKNAME_LEN + 1);
        assert!(TextCodec.decode(&tokens(&["NAME", &long])).is_err());
    }

    #[test]
    fn test_decode_empty_frame_fails() {
        assert_eq!(TextCodec.decode(&[]), Err(ProtocolError::EmptyFrame));
    }

    // =====================================================================
    // encode
    // =====================================================================

    #[test]
    fn test_encode_ping_exact_line() {
        assert_eq!(TextCodec.encode(&ServerMessage::Ping), "PRSI PING |\n");
    }

    #[test]
    fn test_encode_ok_and_fail() {
        assert_eq!(body(&ServerMessage::Ok(Command::Name)), tokens(&["OK", "NAME"]));
        assert_eq!(
            body(&ServerMessage::Fail(Command::CreateRoom)),
            tokens(&["FAIL", "CREATE_ROOM"])
        );
    }

    #[test]
    fn test_encode_rooms_lists_every_room() {
        let rooms = vec![
            RoomSummary { id: RoomId(0), state: RoomState::Waiting },
            RoomSummary { id: RoomId(1), state: RoomState::Playing },
            RoomSummary { id: RoomId(4), state: RoomState::Finished },
        ];

        let parsed = body(&ServerMessage::Rooms(rooms));

        assert_eq!(
            parsed,
            tokens(&["ROOMS", "3", "0", "WAITING", "1", "PLAYING", "4", "FINISHED"])
        );
    }

    #[test]
    fn test_encode_room_lists_players_with_liveness() {
        let room = RoomView {
            id: RoomId(2),
            state: RoomState::Waiting,
            players: vec![
                PlayerView { nickname: "alice".into(), awake: true },
                PlayerView { nickname: "bob".into(), awake: false },
            ],
        };

        assert_eq!(
            body(&ServerMessage::Room(room)),
            tokens(&["ROOM", "2", "WAITING", "PLAYERS", "2", "alice", "awake", "bob", "sleep"])
        );
    }

    #[test]
    fn test_encode_hand_and_cards_prefix_count() {
        let cards = vec![
            Card::new(Suit::Hearts, Rank::Seven),
            Card::new(Suit::Clubs, Rank::King),
        ];
        assert_eq!(
            body(&ServerMessage::Hand(cards)),
            tokens(&["HAND", "2", "S7", "ZK"])
        );
        assert_eq!(body(&ServerMessage::Cards(vec![])), tokens(&["CARDS", "0"]));
    }

    #[test]
    fn test_encode_game_flow_messages() {
        let top = Card::new(Suit::Diamonds, Rank::Nine);
        assert_eq!(
            body(&ServerMessage::Turn(TurnView { nickname: "bob".into(), top })),
            tokens(&["TURN", "bob", "TOP", "K9"])
        );
        assert_eq!(
            body(&ServerMessage::Played { nickname: "al".into(), card: top }),
            tokens(&["PLAYED", "al", "K9"])
        );
        assert_eq!(
            body(&ServerMessage::Drawed { nickname: "al".into(), count: 4 }),
            tokens(&["DRAWED", "al", "4"])
        );
        assert_eq!(body(&ServerMessage::Skip("al".into())), tokens(&["SKIP", "al"]));
        assert_eq!(body(&ServerMessage::GameStart), tokens(&["GAME_START"]));
        assert_eq!(body(&ServerMessage::Win), tokens(&["WIN"]));
        assert_eq!(body(&ServerMessage::Lose), tokens(&["LOSE"]));
        assert_eq!(
            body(&ServerMessage::Leaderboard(vec!["a".into(), "b".into()])),
            tokens(&["LEADERBOARD", "2", "a", "b"])
        );
    }

    #[test]
    fn test_encode_presence_messages() {
        assert_eq!(body(&ServerMessage::Join("x".into())), tokens(&["JOIN", "x"]));
        assert_eq!(body(&ServerMessage::Leave("x".into())), tokens(&["LEAVE", "x"]));
        assert_eq!(body(&ServerMessage::Sleep("x".into())), tokens(&["SLEEP", "x"]));
        assert_eq!(body(&ServerMessage::Awake("x".into())), tokens(&["AWAKE", "x"]));
        assert_eq!(body(&ServerMessage::Dead("x".into())), tokens(&["DEAD", "x"]));
    }

    #[test]
    fn test_encode_state_for_each_location() {
        assert_eq!(
            body(&ServerMessage::State(StateView::Unnamed)),
            tokens(&["STATE", "UNNAMED"])
        );
        assert_eq!(
            body(&ServerMessage::State(StateView::Lobby)),
            tokens(&["STATE", "LOBBY"])
        );

        let room = RoomView {
            id: RoomId(0),
            state: RoomState::Playing,
            players: vec![PlayerView { nickname: "a".into(), awake: true }],
        };
        let game = StateView::Game {
            room,
            hand: vec![Card::new(Suit::Spades, Rank::Under)],
            turn: Some(TurnView {
                nickname: "a".into(),
                top: Card::new(Suit::Spades, Rank::Ten),
            }),
        };

        assert_eq!(
            body(&ServerMessage::State(game)),
            tokens(&[
                "STATE", "GAME", "ROOM", "0", "PLAYING", "PLAYERS", "1", "a", "awake", "HAND",
                "1", "LJ", "TURN", "a", "TOP", "L0",
            ])
        );
    }
}
