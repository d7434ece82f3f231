//! The dice engine.
//!
//! A roll is two independent uniform draws over `1..=6`. Exactly one
//! outcome is special: the maximum double (6+6) is not a move at all but
//! a "roll again" signal. Any other pair, doubles included, is an
//! ordinary consumable total.
//!
//! Where the faces come from is a [`FaceSource`]: seeded or OS-random
//! in normal play, a fixed script for replays and tests.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::RulesError;

/// Faces per die.
pub const FACES: u8 = 6;

/// Smallest total a roll can produce.
pub const MIN_TOTAL: u32 = 2;

/// Largest total that can ever be committed: 12 is only reachable via the
/// maximum double, which never moves a token.
pub const MAX_CONSUMABLE_TOTAL: u32 = 11;

// ---------------------------------------------------------------------------
// RollResult
// ---------------------------------------------------------------------------

/// Two die faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RollResult {
    pub first: u8,
    pub second: u8,
}

impl RollResult {
    /// Builds a roll from explicit faces.
    ///
    /// # Errors
    /// [`RulesError::InvalidFace`] if either face is outside `1..=6`.
    pub fn new(first: u8, second: u8) -> Result<Self, RulesError> {
        for face in [first, second] {
            if !(1..=FACES).contains(&face) {
                return Err(RulesError::InvalidFace(face));
            }
        }
        Ok(Self { first, second })
    }

    /// Sum of both faces, `2..=12`.
    pub fn total(&self) -> u32 {
        u32::from(self.first) + u32::from(self.second)
    }

    /// Both dice show the same face.
    pub fn is_double(&self) -> bool {
        self.first == self.second
    }

    /// 6 and 6.
    pub fn is_max_double(&self) -> bool {
        self.first == FACES && self.second == FACES
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}={}", self.first, self.second, self.total())
    }
}

// ---------------------------------------------------------------------------
// DiceOutcome
// ---------------------------------------------------------------------------

/// What the caller may do with a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceOutcome {
    /// Move `total()` squares; the turn's roll is then used up.
    Consumable(RollResult),
    /// Maximum double: discard for movement and roll again.
    RollAgain(RollResult),
}

impl DiceOutcome {
    /// The faces behind the outcome, whichever it is.
    pub fn roll(&self) -> RollResult {
        match self {
            Self::Consumable(r) | Self::RollAgain(r) => *r,
        }
    }

    /// The movement total, or `None` when the roll must be repeated.
    pub fn consumable_total(&self) -> Option<u32> {
        match self {
            Self::Consumable(r) => Some(r.total()),
            Self::RollAgain(_) => None,
        }
    }
}

/// Classifies a roll. Only the maximum double asks for another roll.
pub fn judge(roll: RollResult) -> DiceOutcome {
    if roll.is_max_double() {
        DiceOutcome::RollAgain(roll)
    } else {
        DiceOutcome::Consumable(roll)
    }
}

// ---------------------------------------------------------------------------
// Face sources
// ---------------------------------------------------------------------------

/// Produces single die faces in `1..=6`.
pub trait FaceSource: Send + 'static {
    fn next_face(&mut self) -> u8;
}

/// Uniform faces from a `StdRng`.
#[derive(Debug, Clone)]
pub struct RandomFaces {
    rng: StdRng,
}

impl RandomFaces {
    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl FaceSource for RandomFaces {
    fn next_face(&mut self) -> u8 {
        self.rng.random_range(1..=FACES)
    }
}

/// Replays a fixed list of faces, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct FixedFaces {
    faces: VecDeque<u8>,
}

impl FixedFaces {
    /// # Errors
    /// [`RulesError::EmptyScript`] for an empty list,
    /// [`RulesError::InvalidFace`] for any face outside `1..=6`.
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Result<Self, RulesError> {
        let faces: VecDeque<u8> = faces.into_iter().collect();
        if faces.is_empty() {
            return Err(RulesError::EmptyScript);
        }
        if let Some(bad) = faces.iter().find(|f| !(1..=FACES).contains(*f)) {
            return Err(RulesError::InvalidFace(*bad));
        }
        Ok(Self { faces })
    }

    /// Convenience for scripting whole rolls.
    pub fn from_pairs(pairs: &[(u8, u8)]) -> Result<Self, RulesError> {
        Self::new(pairs.iter().flat_map(|&(a, b)| [a, b]))
    }
}

impl FaceSource for FixedFaces {
    fn next_face(&mut self) -> u8 {
        // non-empty by construction
        let face = self.faces.pop_front().unwrap_or(1);
        self.faces.push_back(face);
        face
    }
}

// ---------------------------------------------------------------------------
// Dice
// ---------------------------------------------------------------------------

/// A pair of dice bound to a face source.
pub struct Dice {
    source: Box<dyn FaceSource>,
}

impl Dice {
    /// Dice over any face source.
    pub fn new(source: impl FaceSource) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Deterministic dice for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(RandomFaces::seeded(seed))
    }

    /// Production dice.
    pub fn from_os_rng() -> Self {
        Self::new(RandomFaces::from_os_rng())
    }

    /// Dice that replay `pairs` in order.
    pub fn scripted(pairs: &[(u8, u8)]) -> Result<Self, RulesError> {
        Ok(Self::new(FixedFaces::from_pairs(pairs)?))
    }

    /// Draws both dice and classifies the result.
    pub fn roll(&mut self) -> DiceOutcome {
        let roll = RollResult {
            first: self.source.next_face(),
            second: self.source.next_face(),
        };
        judge(roll)
    }
}

impl fmt::Debug for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dice").finish_non_exhaustive()
    }
}
