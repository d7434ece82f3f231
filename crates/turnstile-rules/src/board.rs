//! Static board layout and square classification.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::movement::{Movement, resolve};
use crate::RulesError;

/// Colour set (or utility class) a property belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
    Railroad,
    Utility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    Chance,
    CommunityChest,
    IncomeTax,
    LuxuryTax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerKind {
    Go,
    Jail,
    FreeParking,
    GoToJail,
}

/// What landing on a square asks the property/card subsystem to do.
///
/// Each variant carries only what its handler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ActionCategory {
    Property { name: String, group: PropertyGroup },
    Special { kind: SpecialKind },
    Corner { kind: CornerKind },
}

impl ActionCategory {
    fn property(name: &str, group: PropertyGroup) -> Self {
        Self::Property {
            name: name.to_string(),
            group,
        }
    }

    /// Short human-readable label, used in move history comments.
    pub fn label(&self) -> String {
        match self {
            Self::Property { name, .. } => name.clone(),
            Self::Special { kind } => match kind {
                SpecialKind::Chance => "Chance",
                SpecialKind::CommunityChest => "Community Chest",
                SpecialKind::IncomeTax => "Income Tax",
                SpecialKind::LuxuryTax => "Luxury Tax",
            }
            .to_string(),
            Self::Corner { kind } => match kind {
                CornerKind::Go => "Go",
                CornerKind::Jail => "Jail",
                CornerKind::FreeParking => "Free Parking",
                CornerKind::GoToJail => "Go To Jail",
            }
            .to_string(),
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Self::Property { .. })
    }
}

/// Ordered squares of a circular board. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ActionCategory>", into = "Vec<ActionCategory>")]
pub struct BoardLayout {
    squares: Vec<ActionCategory>,
}

impl BoardLayout {
    /// # Errors
    /// [`RulesError::EmptyBoard`] if `squares` is empty.
    pub fn new(squares: Vec<ActionCategory>) -> Result<Self, RulesError> {
        if squares.is_empty() {
            return Err(RulesError::EmptyBoard);
        }
        Ok(Self { squares })
    }

    /// The standard 40-square board.
    pub fn classic() -> Self {
        use ActionCategory as A;
        use PropertyGroup::*;

        let chance = || A::Special { kind: SpecialKind::Chance };
        let chest = || A::Special { kind: SpecialKind::CommunityChest };

        let squares = vec![
            A::Corner { kind: CornerKind::Go },
            A::property("Mediterranean Avenue", Brown),
            chest(),
            A::property("Baltic Avenue", Brown),
            A::Special { kind: SpecialKind::IncomeTax },
            A::property("Reading Railroad", Railroad),
            A::property("Oriental Avenue", LightBlue),
            chance(),
            A::property("Vermont Avenue", LightBlue),
            A::property("Connecticut Avenue", LightBlue),
            A::Corner { kind: CornerKind::Jail },
            A::property("St. Charles Place", Pink),
            A::property("Electric Company", Utility),
            A::property("States Avenue", Pink),
            A::property("Virginia Avenue", Pink),
            A::property("Pennsylvania Railroad", Railroad),
            A::property("St. James Place", Orange),
            chest(),
            A::property("Tennessee Avenue", Orange),
            A::property("New York Avenue", Orange),
            A::Corner { kind: CornerKind::FreeParking },
            A::property("Kentucky Avenue", Red),
            chance(),
            A::property("Indiana Avenue", Red),
            A::property("Illinois Avenue", Red),
            A::property("B. & O. Railroad", Railroad),
            A::property("Atlantic Avenue", Yellow),
            A::property("Ventnor Avenue", Yellow),
            A::property("Water Works", Utility),
            A::property("Marvin Gardens", Yellow),
            A::Corner { kind: CornerKind::GoToJail },
            A::property("Pacific Avenue", Green),
            A::property("North Carolina Avenue", Green),
            chest(),
            A::property("Pennsylvania Avenue", Green),
            A::property("Short Line", Railroad),
            chance(),
            A::property("Park Place", DarkBlue),
            A::Special { kind: SpecialKind::LuxuryTax },
            A::property("Boardwalk", DarkBlue),
        ];
        Self { squares }
    }

    /// Number of squares.
    pub fn size(&self) -> NonZeroU32 {
        // non-empty by construction
        NonZeroU32::new(self.squares.len() as u32).unwrap_or(NonZeroU32::MIN)
    }

    /// Category of the square at `position`, taken modulo the board size.
    pub fn classify(&self, position: u32) -> &ActionCategory {
        let idx = position % self.size().get();
        &self.squares[idx as usize]
    }

    /// Moves `total` squares from `current` and classifies the landing square.
    pub fn advance(&self, current: u32, total: u32) -> (Movement, &ActionCategory) {
        let movement = resolve(current, total, self.size());
        (movement, self.classify(movement.to))
    }

    pub fn squares(&self) -> &[ActionCategory] {
        &self.squares
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::classic()
    }
}

impl TryFrom<Vec<ActionCategory>> for BoardLayout {
    type Error = RulesError;

    fn try_from(squares: Vec<ActionCategory>) -> Result<Self, Self::Error> {
        Self::new(squares)
    }
}

impl From<BoardLayout> for Vec<ActionCategory> {
    fn from(layout: BoardLayout) -> Self {
        layout.squares
    }
}
