//! The Turn Authority for Turnstile.
//!
//! The single source of truth for whose turn it is and whether that
//! player's roll for the turn has been used. Clients may predict a move,
//! but nothing sticks until it is committed here.
//!
//! # Key types
//!
//! - [`AuthorityManager`]: creates/destroys sessions, routes players
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`SessionConfig`]: player limits, starting balance, board
//! - [`turn`]: the pure arbitration rules the actors apply

mod config;
mod error;
mod manager;
mod session;
pub mod turn;

pub use config::SessionConfig;
pub use error::{AuthorityError, Ineligibility};
pub use manager::{AuthorityManager, CODE_LEN, archive, joinable_summaries};
pub use session::SessionHandle;
pub use turn::{Seat, can_act};
