//! Pure game rules for Turnstile: no I/O, no clocks, no async.
//!
//! - [`Dice`]: the two-die roll and the roll-again signal on 6+6.
//! - [`resolve`] / [`BoardLayout::advance`]: movement with wraparound.
//! - [`BoardLayout`] / [`ActionCategory`]: what kind of square a token
//!   lands on. The category is handed to whoever handles property and
//!   card actions; nothing in this workspace acts on it.
//!
//! Both the Turn Authority (to validate commits) and the client (to
//! predict them) depend on this crate, so the two sides can never
//! disagree about arithmetic.

mod board;
mod dice;
mod error;
mod movement;

pub use board::{ActionCategory, BoardLayout, CornerKind, PropertyGroup, SpecialKind};
pub use dice::{
    Dice, DiceOutcome, FaceSource, FixedFaces, RandomFaces, RollResult, judge,
    FACES, MAX_CONSUMABLE_TOTAL, MIN_TOTAL,
};
pub use error::RulesError;
pub use movement::{Movement, resolve};
