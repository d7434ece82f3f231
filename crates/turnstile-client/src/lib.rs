//! Client side of the Turnstile turn engine.
//!
//! A client predicts its own moves but never decides them. Everything it
//! shows is either an authoritative snapshot or one clearly bounded
//! prediction that is confirmed or undone as a whole.
//!
//! # Key types
//!
//! - [`TurnClient`]: one player in one session; roll, end turn, poll
//! - [`ActionLock`]: at most one mutating intent in flight
//! - [`SessionView`]: the local session copy and its optimistic backup
//! - [`SessionApi`]: the authority's operations; [`RemoteApi`] speaks
//!   them over WebSocket
//! - [`PollScheduler`]: fixed-interval refetch timer

mod api;
mod config;
mod error;
mod lock;
mod notify;
mod poll;
mod reconcile;
mod remote;
mod view;

pub use api::{CommitReply, SessionApi};
pub use config::ClientConfig;
pub use error::ClientError;
pub use lock::{ActionKind, ActionLock, LockGuard};
pub use notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use poll::{PollConfig, PollScheduler, PollTick};
pub use reconcile::{Intent, PollOutcome, RollReport, TurnClient};
pub use remote::RemoteApi;
pub use view::{Adoption, SessionView};
