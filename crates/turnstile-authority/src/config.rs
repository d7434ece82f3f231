//! Session configuration.

use serde::{Deserialize, Serialize};
use turnstile_rules::BoardLayout;

use crate::AuthorityError;

/// Settings applied to every session an [`AuthorityManager`] creates.
///
/// [`AuthorityManager`]: crate::AuthorityManager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum players required before the session can be started.
    pub min_players: usize,

    /// Maximum seats at the table.
    pub max_players: usize,

    /// Balance handed to each player on join. Opaque to the turn engine.
    pub starting_balance: i64,

    /// The board every session plays on.
    pub board: BoardLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            starting_balance: 1500,
            board: BoardLayout::classic(),
        }
    }
}

impl SessionConfig {
    /// Rejects player limits that could never produce a playable session.
    pub fn validate(&self) -> Result<(), AuthorityError> {
        if self.min_players == 0 {
            return Err(AuthorityError::InvalidConfig(
                "min_players must be at least 1".into(),
            ));
        }
        if self.max_players < self.min_players {
            return Err(AuthorityError::InvalidConfig(format!(
                "max_players ({}) is below min_players ({})",
                self.max_players, self.min_players
            )));
        }
        Ok(())
    }
}
