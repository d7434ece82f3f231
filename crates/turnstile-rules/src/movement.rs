//! Movement with wraparound.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// One token move around the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub from: u32,
    pub to: u32,
    pub total: u32,
    /// The move crossed or landed on square 0.
    pub passed_start: bool,
}

/// Applies `total` to `current` on a board of `size` squares.
///
/// `to` is always `(current + total) mod size`, so it lies in `[0, size)`
/// even for a `current` that is already out of range. The sum is taken in
/// 64 bits and cannot overflow.
pub fn resolve(current: u32, total: u32, size: NonZeroU32) -> Movement {
    let size = u64::from(size.get());
    let raw = u64::from(current) + u64::from(total);
    let to = (raw % size) as u32;
    Movement {
        from: current,
        to,
        total,
        passed_start: total > 0 && raw >= size,
    }
}
