use thiserror::Error;

/// Failures surfaced by load/reload. Nothing else in the core fails:
/// blocked moves are no-ops or redirects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The layout does not match the configured dimensions or contains a
    /// code the parser does not know. The previous match, if any, is left
    /// untouched.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// Fill-to-quota ran out of attempts before finding an unoccupied
    /// walkable cell. Raised instead of looping forever on boards with too
    /// few free cells.
    #[error("no unoccupied walkable cell for {kind} after {attempts} attempts")]
    PlacementExhausted { kind: &'static str, attempts: usize },
}
