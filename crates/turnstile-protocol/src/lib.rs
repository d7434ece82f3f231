//! Wire protocol and shared data model for Turnstile.
//!
//! This crate defines everything that both sides of a game agree on:
//!
//! - **Snapshots** ([`GameSession`], [`Player`], [`MoveHistoryEntry`]):
//!   the authoritative session record the server hands out after every
//!   accepted mutation and every poll.
//! - **Envelopes** ([`Envelope`], [`Request`], [`Response`]): the
//!   request/response messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Authority / Client
//! ```
//!
//! The protocol layer knows nothing about turn rules. It only carries
//! snapshots and intents between the Turn Authority and its clients.

mod codec;
mod error;
mod model;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use model::{
    GameSession, JoinCode, MoveHistoryEntry, Player, PlayerId, SessionId,
    SessionStatus,
};
pub use types::{
    Envelope, Payload, Request, Response, SessionSummary, PROTOCOL_VERSION,
};
