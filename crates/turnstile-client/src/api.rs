//! The authoritative operations a client consumes.

use std::future::Future;

use turnstile_protocol::{GameSession, JoinCode, PlayerId, SessionId};

use crate::ClientError;

/// Answer to a mutating call.
///
/// On success `session` is the snapshot to adopt wholesale. On rejection
/// `message` says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReply {
    pub success: bool,
    pub message: Option<String>,
    pub session: Option<GameSession>,
}

impl CommitReply {
    pub fn accepted(session: GameSession) -> Self {
        Self {
            success: true,
            message: None,
            session: Some(session),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            session: None,
        }
    }
}

/// The Turn Authority as seen from a client.
///
/// `Err` means the call itself failed (transport, timeout, protocol). A
/// refused commit is an `Ok` reply with `success: false`.
///
/// Implementations that identify the caller by connection (such as the
/// WebSocket client) may ignore `user`.
pub trait SessionApi: Send + Sync + 'static {
    /// Authoritative snapshot fetch. This is what the poll loop calls.
    fn get_session_by_code(
        &self,
        code: &JoinCode,
    ) -> impl Future<Output = Result<GameSession, ClientError>> + Send;

    fn check_eligibility(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;

    fn commit_position(
        &self,
        user: PlayerId,
        session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    ) -> impl Future<Output = Result<CommitReply, ClientError>> + Send;

    fn end_turn(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> impl Future<Output = Result<CommitReply, ClientError>> + Send;
}
