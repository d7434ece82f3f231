//! Authentication hook for the `Hello` handshake.
//!
//! Turnstile does not verify identities itself. The server calls an
//! [`Authenticator`] with the token from `Hello` and seats whoever it
//! returns. Player ids must be stable across connections: a player who
//! drops and reconnects with the same token keeps their seat.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use turnstile_protocol::PlayerId;

use crate::TurnstileError;

/// Validates a client's token and returns their identity.
///
/// # Example
///
/// ```rust
/// use turnstile::prelude::*;
///
/// /// Uses a numeric token as the player id.
/// struct NumericAuth;
///
/// impl Authenticator for NumericAuth {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, TurnstileError> {
///         token
///             .parse()
///             .map(PlayerId)
///             .map_err(|_| TurnstileError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Called once per connection, during the handshake.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerId, TurnstileError>> + Send;
}

/// Hands out a fresh id per token, and the same id every time that
/// token comes back. Empty tokens are refused.
#[derive(Debug, Default)]
pub struct TokenAuth {
    next: AtomicU64,
    known: Mutex<HashMap<String, PlayerId>>,
}

impl TokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tokens seen so far.
    pub async fn known_players(&self) -> usize {
        self.known.lock().await.len()
    }
}

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, TurnstileError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TurnstileError::AuthFailed("missing token".into()));
        }

        let mut known = self.known.lock().await;
        let id = *known
            .entry(token.to_string())
            .or_insert_with(|| PlayerId(self.next.fetch_add(1, Ordering::Relaxed) + 1));
        Ok(id)
    }
}
