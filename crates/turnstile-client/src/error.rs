//! Error types for the client.

use std::time::Duration;

use turnstile_protocol::ProtocolError;
use turnstile_transport::TransportError;

use crate::ActionKind;

/// Everything a client-side intent or authoritative call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Another intent already holds the Action Lock.
    #[error("a {0} is already in progress")]
    Busy(ActionKind),

    /// The authority says this player may not act now.
    #[error("not allowed: {0}")]
    Ineligible(String),

    /// The authority refused a commit or end-turn.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Consecutive double sixes exceeded the configured cap.
    #[error("rolled the maximum double {0} times in a row")]
    RerollLimit(u32),

    /// No answer within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed or unexpected message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered with an error response.
    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    /// The local client board doesn't match the session's board size.
    #[error("board has {local} squares but the session uses {remote}")]
    BoardMismatch { local: u32, remote: u32 },

    /// The session view was disabled after a fatal error.
    #[error("session view disabled: {0}")]
    Disabled(String),
}

impl ClientError {
    /// Errors after which the view cannot be trusted or recovered:
    /// the session is gone or we are no longer allowed to see it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Server { code: 401 | 404, .. } | Self::BoardMismatch { .. })
    }

    /// Network-level failures, including timeouts and a dropped peer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}
