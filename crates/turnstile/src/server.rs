//! `TurnstileServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → authority.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use turnstile_authority::{AuthorityManager, SessionConfig};
use turnstile_protocol::JsonCodec;
use turnstile_transport::{Listener, WebSocketListener};

use crate::handler::handle_connection;
use crate::{Authenticator, LocalApi, TurnstileError};

/// Server settings, loadable from any serde format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on. Port 0 picks a free port.
    pub bind: String,

    /// A connection that sends nothing for this long is closed. Clients
    /// that poll more often than this never hit it.
    pub idle_timeout: Duration,

    /// How long a fresh connection has to send `Hello`.
    pub handshake_timeout: Duration,

    /// Applied to every session the server creates.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            session: SessionConfig::default(),
        }
    }
}

/// Shared state handed to every connection task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) authority: Arc<Mutex<AuthorityManager>>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Turnstile server.
///
/// # Example
///
/// ```rust,no_run
/// use turnstile::prelude::*;
///
/// # async fn run() -> Result<(), TurnstileError> {
/// let server = TurnstileServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(TokenAuth::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TurnstileServerBuilder {
    config: ServerConfig,
}

impl TurnstileServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a full config instead of the defaults.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Validates the session config and binds the listener.
    pub async fn build<A: Authenticator>(self, auth: A) -> Result<TurnstileServer<A>, TurnstileError> {
        let authority = AuthorityManager::new(self.config.session)?;
        let listener = WebSocketListener::bind(&self.config.bind).await?;

        let state = Arc::new(ServerState {
            authority: Arc::new(Mutex::new(authority)),
            auth,
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            handshake_timeout: self.config.handshake_timeout,
        });

        Ok(TurnstileServer { listener, state })
    }
}

/// A bound Turnstile server, made by [`TurnstileServerBuilder`].
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TurnstileServer<A: Authenticator> {
    listener: WebSocketListener,
    state: Arc<ServerState<A>>,
}

impl<A: Authenticator> TurnstileServer<A> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// The authority this server fronts. Shared with every connection.
    pub fn authority(&self) -> Arc<Mutex<AuthorityManager>> {
        Arc::clone(&self.state.authority)
    }

    /// An in-process client API onto the same authority, for players
    /// sitting at the server's own machine.
    pub fn local_api(&self) -> LocalApi {
        LocalApi::new(self.authority())
    }

    /// Accepts connections until the process ends.
    pub async fn run(self) -> Result<(), TurnstileError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), TurnstileError> {
        tokio::pin!(shutdown);
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Turnstile server running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Turnstile server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
