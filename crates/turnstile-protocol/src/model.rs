//! The authoritative session record and its parts.
//!
//! These are the types the Turn Authority mutates and every client
//! caches. The server always hands out a *whole* [`GameSession`]; clients
//! replace their copy with it rather than patching fields, so every type
//! here derives `PartialEq` for the poll loop's structural comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (the user behind a token on the board).
///
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// The short code players type to find a session.
///
/// Codes are case-insensitive for humans; [`JoinCode::new`] trims and
/// upper-cases so `" ab12cd"` and `"AB12CD"` name the same session.
/// Codes read off the wire are normalized the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct JoinCode(String);

impl From<String> for JoinCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<JoinCode> for String {
    fn from(code: JoinCode) -> Self {
        code.0
    }
}

impl JoinCode {
    /// Normalizes and wraps a raw code.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// ```text
/// PENDING ──(start)──→ RUNNING ──(one player left)──→ FINISHED
/// ```
///
/// Serialized in SCREAMING_SNAKE_CASE to match the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Accepting players; nobody may act yet.
    Pending,
    /// Turns are being played.
    Running,
    /// Game over. The record is kept until archived.
    Finished,
}

impl SessionStatus {
    /// Returns `true` if new players may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` if moves and turn changes are accepted.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One seat at the table.
///
/// Only `position` and `rolls` are touched by the turn engine; `balance`
/// is carried for the economy layer and never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: PlayerId,
    pub name: String,
    /// Symbol drawn on the board for this player.
    pub token: String,
    /// Square index, always in `[0, board_size)`.
    pub position: u32,
    pub balance: i64,
    /// Index into the fixed turn order, assigned at join.
    pub turn_order: usize,
    /// Rolls committed during the current turn.
    pub rolls: u32,
}

// ---------------------------------------------------------------------------
// MoveHistoryEntry
// ---------------------------------------------------------------------------

/// A line in the session's move log.
///
/// `rolled` is zero for entries that record a turn transition rather than
/// a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHistoryEntry {
    pub player: PlayerId,
    pub rolled: u32,
    pub comment: String,
    /// Milliseconds since the UNIX epoch, stamped by the server.
    pub at_ms: u64,
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// The authoritative session record.
///
/// `version` strictly increases with every accepted mutation. Clients use
/// it to refuse snapshots older than the one they already hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub code: JoinCode,
    pub status: SessionStatus,
    pub board_size: u32,
    /// Players sorted by `turn_order`.
    pub players: Vec<Player>,
    pub next_player_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    /// Most recent entry first.
    pub history: Vec<MoveHistoryEntry>,
    pub version: u64,
}

impl GameSession {
    /// Looks up a player by user id.
    pub fn player(&self, user_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    /// Mutable lookup by user id.
    pub fn player_mut(&mut self, user_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    /// The player whose turn it is, if the session is running.
    pub fn current_player(&self) -> Option<&Player> {
        self.next_player_id.and_then(|id| self.player(id))
    }

    /// Returns `true` if `user_id` holds a seat in this session.
    pub fn contains(&self, user_id: PlayerId) -> bool {
        self.player(user_id).is_some()
    }

    /// The most recent history entry.
    pub fn last_move(&self) -> Option<&MoveHistoryEntry> {
        self.history.first()
    }
}
