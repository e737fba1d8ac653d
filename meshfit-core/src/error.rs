//! Error types for meshfit

use thiserror::Error;

/// Main error type for meshfit operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or empty input topology
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Target face count is not below the current face count and the
    /// caller asked for this to be rejected rather than passed through
    #[error("Unreachable target: {target} faces requested, mesh already has {current}")]
    UnreachableTarget { target: usize, current: usize },

    /// Charts could not be packed within the iteration budget
    #[error(
        "Atlas packing failed after {iterations} iterations: \
         placed {placed_charts}/{total_charts} charts, best utilization {utilization:.3}"
    )]
    AtlasPacking {
        iterations: u32,
        utilization: f32,
        placed_charts: usize,
        total_charts: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for meshfit operations
pub type Result<T> = std::result::Result<T, Error>;
