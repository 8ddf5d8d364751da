//! Error types for the nesting engine.

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Only unrecoverable conditions become `Err` values. Degraded-but-recoverable
/// situations (a pair of polygons with no computable NFP, a part that cannot
/// be placed) are folded into the solve result instead: the affected parts
/// show up in `NestResult::unplaced` and in the fitness penalty.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input: too few vertices, non-finite coordinates,
    /// self-intersecting outlines, or an empty part list.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A clipping request cannot be satisfied, e.g. the scaled integer
    /// coordinate range would overflow or an offset collapsed the polygon.
    #[error("infeasible geometry: {0}")]
    Infeasible(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
