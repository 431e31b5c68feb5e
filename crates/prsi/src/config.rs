//! Server configuration.

use std::time::Duration;

use prsi_game::deck::DECK_SIZE;
use prsi_room::RoomConfig;
use prsi_session::{LivenessConfig, SessionConfig};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Every tunable of the server, as one plain value.
///
/// Durations are in milliseconds so the struct maps one-to-one onto the
/// `[server]` table of a configuration file. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_address: String,

    /// Most readiness events handled per poll.
    pub max_events: usize,

    /// Longest time one poll waits. Also bounds how often liveness is
    /// checked.
    pub poll_timeout_ms: u64,

    /// Connections beyond this count are closed right after accept.
    pub max_clients: usize,

    /// Rooms the lobby may hold at once.
    pub max_rooms: usize,

    /// Seats per room; a full room starts its game.
    pub room_capacity: usize,

    /// Cards dealt to each player.
    pub hand_size: usize,

    pub ping_interval_ms: u64,
    pub sleep_after_ms: u64,
    pub dead_after_ms: u64,

    /// Unframed input a single connection may accumulate.
    pub max_buffered_bytes: usize,

    /// Bytes requested per socket read.
    pub read_chunk: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3750".to_string(),
            max_events: 32,
            poll_timeout_ms: 500,
            max_clients: 10,
            max_rooms: 10,
            room_capacity: 2,
            hand_size: 4,
            ping_interval_ms: 2_000,
            sleep_after_ms: 5_000,
            dead_after_ms: 180_000,
            max_buffered_bytes: 1_000_000,
            read_chunk: 1024,
        }
    }
}

impl ServerConfig {
    /// Returns a copy with nonsensical values replaced by usable ones.
    ///
    /// Each correction is logged at `warn`.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.room_capacity < 2 {
            tracing::warn!(room_capacity = self.room_capacity, "room capacity below 2, using 2");
            self.room_capacity = 2;
        }
        // Each player needs a card and one card must stay in the deck.
        let max_capacity = DECK_SIZE - 2;
        if self.room_capacity > max_capacity {
            tracing::warn!(
                room_capacity = self.room_capacity,
                max_capacity,
                "room capacity does not fit one deck"
            );
            self.room_capacity = max_capacity;
        }
        let max_hand = (DECK_SIZE - 2) / self.room_capacity;
        if self.hand_size == 0 || self.hand_size > max_hand {
            let fixed = self.hand_size.clamp(1, max_hand);
            tracing::warn!(hand_size = self.hand_size, fixed, "hand size does not fit the deck");
            self.hand_size = fixed;
        }

        if self.max_rooms == 0 {
            tracing::warn!("max_rooms is 0, using {}", defaults.max_rooms);
            self.max_rooms = defaults.max_rooms;
        }
        if self.max_clients == 0 {
            tracing::warn!("max_clients is 0, using {}", defaults.max_clients);
            self.max_clients = defaults.max_clients;
        }
        if self.max_events == 0 {
            tracing::warn!("max_events is 0, using {}", defaults.max_events);
            self.max_events = defaults.max_events;
        }
        if self.poll_timeout_ms == 0 {
            tracing::warn!("poll_timeout_ms is 0, using {}", defaults.poll_timeout_ms);
            self.poll_timeout_ms = defaults.poll_timeout_ms;
        }
        if self.read_chunk == 0 {
            tracing::warn!("read_chunk is 0, using {}", defaults.read_chunk);
            self.read_chunk = defaults.read_chunk;
        }
        if self.max_buffered_bytes < self.read_chunk {
            tracing::warn!(
                max_buffered_bytes = self.max_buffered_bytes,
                read_chunk = self.read_chunk,
                "buffer limit smaller than one read, raising it"
            );
            self.max_buffered_bytes = self.read_chunk;
        }

        if !self.liveness().is_ordered() {
            tracing::warn!(
                ping_interval_ms = self.ping_interval_ms,
                sleep_after_ms = self.sleep_after_ms,
                dead_after_ms = self.dead_after_ms,
                "liveness thresholds must satisfy 0 < ping < sleep < dead, using defaults"
            );
            self.ping_interval_ms = defaults.ping_interval_ms;
            self.sleep_after_ms = defaults.sleep_after_ms;
            self.dead_after_ms = defaults.dead_after_ms;
        }

        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            sleep_after: Duration::from_millis(self.sleep_after_ms),
            dead_after: Duration::from_millis(self.dead_after_ms),
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            liveness: self.liveness(),
            max_buffered_bytes: self.max_buffered_bytes,
            read_chunk: self.read_chunk,
        }
    }

    pub fn room(&self) -> RoomConfig {
        RoomConfig {
            capacity: self.room_capacity,
            hand_size: self.hand_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:3750");
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.room_capacity, 2);
        assert_eq!(config.poll_timeout(), Duration::from_millis(500));
        assert!(config.liveness().is_ordered());
    }

    #[test]
    fn test_server_config_default_survives_validation() {
        assert_eq!(ServerConfig::default().validated(), ServerConfig::default());
    }

    #[test]
    fn test_validated_raises_capacity_and_shrinks_hand() {
        let config = ServerConfig {
            room_capacity: 1,
            hand_size: 40,
            ..ServerConfig::default()
        }
        .validated();

        assert_eq!(config.room_capacity, 2);
        assert_eq!(config.hand_size, 15);
    }

    #[test]
    fn test_validated_replaces_zero_limits() {
        let config = ServerConfig {
            max_rooms: 0,
            max_clients: 0,
            max_events: 0,
            ..ServerConfig::default()
        }
        .validated();

        assert_eq!(config.max_rooms, 10);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.max_events, 32);
    }

    #[test]
    fn test_validated_resets_unordered_thresholds() {
        let config = ServerConfig {
            ping_interval_ms: 9_000,
            sleep_after_ms: 5_000,
            ..ServerConfig::default()
        }
        .validated();

        assert_eq!(config.ping_interval_ms, 2_000);
        assert_eq!(config.sleep_after_ms, 5_000);
        assert_eq!(config.dead_after_ms, 180_000);
    }

    #[test]
    fn test_room_and_session_views() {
        let config = ServerConfig {
            room_capacity: 3,
            hand_size: 5,
            read_chunk: 64,
            ..ServerConfig::default()
        };

        assert_eq!(config.room(), RoomConfig { capacity: 3, hand_size: 5 });
        assert_eq!(config.session().read_chunk, 64);
        assert_eq!(config.session().liveness.sleep_after, Duration::from_secs(5));
    }
}
