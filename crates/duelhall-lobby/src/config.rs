//! Lobby configuration.

use std::time::Duration;

/// Settings for the lobby actor.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Pause between the final `state_updated` and `session_ended`, so
    /// clients can draw the last board before the end notice.
    ///
    /// `Duration::ZERO` sends `session_ended` in the same step as the
    /// final move.
    pub finish_delay: Duration,

    /// Capacity of the lobby's command channel. Callers wait when it fills.
    pub channel_size: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            finish_delay: Duration::from_secs(1),
            channel_size: 256,
        }
    }
}
