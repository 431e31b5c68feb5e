//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every room the lobby creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Seats per room. The game starts as soon as they are all taken.
    pub capacity: usize,

    /// Cards dealt to each player. Shrunk by the engine if the deck is too
    /// small for `capacity` hands.
    pub hand_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            hand_size: 4,
        }
    }
}
