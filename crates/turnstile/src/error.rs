//! Unified error type for the Turnstile server.

use turnstile_authority::{AuthorityError, Ineligibility};
use turnstile_client::ClientError;
use turnstile_protocol::ProtocolError;
use turnstile_transport::TransportError;

/// Top-level error that wraps every sub-crate's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// The handshake token was refused.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

/// Wire status for an authority failure, following HTTP conventions.
pub(crate) fn status_code(err: &AuthorityError) -> u16 {
    match err {
        AuthorityError::NotFound(_) | AuthorityError::CodeNotFound(_) => 404,
        AuthorityError::NotMember(..)
        | AuthorityError::AlreadyInSession(..)
        | AuthorityError::SessionFull(_)
        | AuthorityError::InvalidState(_) => 409,
        AuthorityError::Ineligible(_)
        | AuthorityError::InvalidMove(_)
        | AuthorityError::InvalidConfig(_) => 400,
        AuthorityError::Unavailable(_) => 503,
    }
}

/// A move the authority turned down as a matter of game rules, as
/// opposed to a request it could not serve at all.
pub(crate) fn is_rejection(err: &AuthorityError) -> bool {
    matches!(
        err,
        AuthorityError::Ineligible(_) | AuthorityError::InvalidMove(_)
    )
}

impl From<Ineligibility> for TurnstileError {
    fn from(reason: Ineligibility) -> Self {
        Self::Authority(reason.into())
    }
}
