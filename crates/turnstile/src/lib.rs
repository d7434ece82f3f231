//! # Turnstile
//!
//! Server-authoritative turn sessions for board games.
//!
//! Players roll on their own machines and predict where they land; the
//! server re-validates every move, owns turn order, and hands back full
//! session snapshots that clients adopt wholesale. Clients poll for
//! everyone else's moves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnstile::prelude::*;
//!
//! # async fn run() -> Result<(), TurnstileError> {
//! let server = TurnstileServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(TokenAuth::new())
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The pieces live in their own crates and are re-exported here:
//! [`turnstile_rules`] (dice, movement, board), [`turnstile_authority`]
//! (the per-session actors), and [`turnstile_client`] (action lock,
//! prediction, polling).

mod auth;
mod error;
mod handler;
mod local;
mod logging;
mod server;

pub use auth::{Authenticator, TokenAuth};
pub use error::TurnstileError;
pub use local::LocalApi;
pub use logging::init_logging;
pub use server::{ServerConfig, TurnstileServer, TurnstileServerBuilder};

pub use turnstile_authority;
pub use turnstile_client;
pub use turnstile_protocol;
pub use turnstile_rules;

pub mod prelude {
    pub use crate::{
        Authenticator, LocalApi, ServerConfig, TokenAuth, TurnstileError, TurnstileServer,
        TurnstileServerBuilder, init_logging,
    };
    pub use turnstile_authority::{AuthorityManager, Seat, SessionConfig};
    pub use turnstile_client::{
        ActionKind, ChannelNotifier, ClientConfig, ClientError, Intent, Notice, NoticeLevel,
        Notifier, PollConfig, RemoteApi, RollReport, SessionApi, TracingNotifier, TurnClient,
    };
    pub use turnstile_protocol::{
        GameSession, JoinCode, PlayerId, SessionId, SessionStatus, PROTOCOL_VERSION,
    };
    pub use turnstile_rules::{ActionCategory, BoardLayout, Dice, RollResult};
}
