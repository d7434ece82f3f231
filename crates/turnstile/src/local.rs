//! In-process [`SessionApi`] backed directly by an [`AuthorityManager`].
//!
//! Used for hot-seat play and tests where client and authority share a
//! process. It answers exactly as the WebSocket handler would: rule
//! violations come back as rejected replies, everything else as
//! [`ClientError::Server`] with the same status code.

use std::sync::Arc;

use tokio::sync::Mutex;
use turnstile_authority::{AuthorityError, AuthorityManager, SessionHandle};
use turnstile_client::{ClientError, CommitReply, SessionApi};
use turnstile_protocol::{GameSession, JoinCode, PlayerId, SessionId};

use crate::error::{is_rejection, status_code};

#[derive(Clone)]
pub struct LocalApi {
    authority: Arc<Mutex<AuthorityManager>>,
}

impl LocalApi {
    pub fn new(authority: Arc<Mutex<AuthorityManager>>) -> Self {
        Self { authority }
    }

    /// The shared manager, for lobby operations.
    pub fn authority(&self) -> &Arc<Mutex<AuthorityManager>> {
        &self.authority
    }

    // The manager lock is held only long enough to clone a handle.
    async fn handle(&self, session_id: SessionId) -> Result<SessionHandle, ClientError> {
        self.authority
            .lock()
            .await
            .handle(session_id)
            .map_err(|e| to_client_error(&e))
    }
}

impl SessionApi for LocalApi {
    async fn get_session_by_code(&self, code: &JoinCode) -> Result<GameSession, ClientError> {
        let handle = self
            .authority
            .lock()
            .await
            .handle_by_code(code)
            .map_err(|e| to_client_error(&e))?;
        handle.snapshot().await.map_err(|e| to_client_error(&e))
    }

    async fn check_eligibility(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<bool, ClientError> {
        let handle = self.handle(session_id).await?;
        handle
            .check_eligibility(user)
            .await
            .map_err(|e| to_client_error(&e))
    }

    async fn commit_position(
        &self,
        user: PlayerId,
        session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    ) -> Result<CommitReply, ClientError> {
        let handle = self.handle(session_id).await?;
        to_reply(handle.commit_position(user, new_position, rolled_total).await)
    }

    async fn end_turn(&self, user: PlayerId, session_id: SessionId) -> Result<CommitReply, ClientError> {
        let handle = self.handle(session_id).await?;
        to_reply(handle.end_turn(user).await)
    }
}

/// Accepted → snapshot; rule violation → rejected reply; otherwise an error.
pub(crate) fn to_reply(result: Result<GameSession, AuthorityError>) -> Result<CommitReply, ClientError> {
    match result {
        Ok(session) => Ok(CommitReply::accepted(session)),
        Err(e) if is_rejection(&e) => Ok(CommitReply::rejected(e.to_string())),
        Err(e) => Err(to_client_error(&e)),
    }
}

fn to_client_error(err: &AuthorityError) -> ClientError {
    ClientError::Server {
        code: status_code(err),
        message: err.to_string(),
    }
}
