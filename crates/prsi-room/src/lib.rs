//! Rooms and the lobby for the Prsi server.
//!
//! A [`Room`] seats players and, once full, owns one running
//! [`Game`](prsi_game::Game). The [`Lobby`] owns every room and hands out
//! room ids.
//!
//! Nothing here talks to the network. Rooms know players only by
//! [`PlayerId`](prsi_protocol::PlayerId); the server maps those to
//! sessions and decides who hears about what.
//!
//! # Key types
//!
//! - [`Lobby`]: creates and removes rooms, reuses freed ids
//! - [`Room`]: seating, game start, departures
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: capacity and hand size

mod config;
mod error;
mod lobby;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use lobby::Lobby;
pub use prsi_protocol::RoomState;
pub use room::{Departure, Room};
