//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use turnstile_rules::BoardLayout;

use crate::PollConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Background refetch timing.
    pub poll: PollConfig,

    /// Pause between the roll request and the dice result, while the
    /// dice animate. Zero disables it.
    pub animation_delay: Duration,

    /// How long to wait for any authoritative call before treating it
    /// as a transport failure.
    pub request_timeout: Duration,

    /// Double sixes allowed per turn. One more abandons the roll, and
    /// further rolls are refused until a new snapshot arrives.
    pub max_rerolls: u32,

    /// Must match the board the session is played on; used to predict
    /// moves and to name the square landed on.
    pub board: BoardLayout,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            animation_delay: Duration::from_millis(800),
            request_timeout: Duration::from_secs(10),
            max_rerolls: 3,
            board: BoardLayout::classic(),
        }
    }
}
