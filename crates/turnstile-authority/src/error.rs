//! Error types for the authority layer.

use turnstile_protocol::{JoinCode, PlayerId, SessionId, SessionStatus};

/// Why a player may not roll or end their turn right now.
///
/// These are ordinary game outcomes, not faults: the client shows them as a
/// notice and does nothing else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ineligibility {
    /// Moves are only accepted while the session is running.
    #[error("session is {0}, not running")]
    NotRunning(SessionStatus),

    /// Someone else is next to act.
    #[error("it is not your turn")]
    NotYourTurn,

    /// The roll for this turn has already been committed.
    #[error("you have already rolled this turn")]
    RollConsumed,

    /// Ending a turn requires a committed roll first.
    #[error("you must roll before ending your turn")]
    NoRollYet,
}

/// Errors returned by the Turn Authority.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// No session with this id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// No session with this join code.
    #[error("no session with code {0}")]
    CodeNotFound(JoinCode),

    /// The player has no seat in the session.
    #[error("player {0} is not in session {1}")]
    NotMember(PlayerId, SessionId),

    /// A user sits in at most one session at a time.
    #[error("player {0} is already in session {1}")]
    AlreadyInSession(PlayerId, SessionId),

    /// Every seat is taken.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The session's lifecycle state doesn't allow this operation.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// The player may not act right now.
    #[error(transparent)]
    Ineligible(#[from] Ineligibility),

    /// The committed position or total does not follow the rules.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Rejected at session creation.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The session actor's command channel is full or closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}
