//! Liveness thresholds and the Awake → Sleep → Dead state machine.

use std::time::Duration;

// ---------------------------------------------------------------------------
// LivenessConfig
// ---------------------------------------------------------------------------

/// How long a connection may stay silent before something happens.
///
/// The three thresholds are expected to be strictly ordered:
/// `ping_interval < sleep_after < dead_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// A `PING` goes out whenever this much time passed since the last one.
    pub ping_interval: Duration,

    /// Silence longer than this puts the session to Sleep.
    pub sleep_after: Duration,

    /// Silence longer than this kills the session.
    pub dead_after: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(2_000),
            sleep_after: Duration::from_millis(5_000),
            dead_after: Duration::from_millis(180_000),
        }
    }
}

impl LivenessConfig {
    /// Returns `true` when the thresholds are strictly increasing.
    pub fn is_ordered(&self) -> bool {
        !self.ping_interval.is_zero()
            && self.ping_interval < self.sleep_after
            && self.sleep_after < self.dead_after
    }
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Whether a connection is still talking to us.
///
/// ```text
///   Awake ──(silence > sleep_after)──→ Sleep ──(silence > dead_after)──→ Dead
///     ↑                                  │
///     └────────────(any traffic)─────────┘
/// ```
///
/// `Dead` is terminal: the server terminates the session as soon as it
/// gets there, and traffic arriving afterwards changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    #[default]
    Awake,
    Sleep,
    Dead,
}

impl Liveness {
    pub fn is_awake(&self) -> bool {
        matches!(self, Self::Awake)
    }
}

/// A transition the server has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// The session just went from Awake to Sleep. Reported once per nap.
    FellAsleep,

    /// The session crossed the death threshold. Reported exactly once.
    Died,
}
