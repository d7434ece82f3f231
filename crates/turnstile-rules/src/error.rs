//! Error types for the rules crate.

/// Invalid rule inputs. Rolling and moving themselves never fail; only
/// building dice or boards from bad data does.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// A scripted die face outside `1..=6`.
    #[error("die face {0} is outside 1..=6")]
    InvalidFace(u8),

    /// A scripted face source with nothing to replay.
    #[error("scripted dice need at least one face")]
    EmptyScript,

    /// A board with no squares cannot be moved on.
    #[error("board layout has no squares")]
    EmptyBoard,
}
