//! Error types for k-NN graph construction.

use thiserror::Error;

/// Errors that can occur while building the neighbor graph.
///
/// `InvalidParameter` is a rejected input; the remaining four variants are
/// invariant violations that abort construction outright. They signal either
/// corrupt input (e.g. a dataset made entirely of duplicate points) or a
/// programming error, and the builder does not attempt recovery.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Invalid construction parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A tree node was left with fewer than two points.
    #[error("tree split failure")]
    TreeSplit,

    /// A candidate pool held fewer than three entries after deduplication.
    #[error("tree failure: candidate pool exhausted")]
    PoolExhausted,

    /// A reduced neighbor column came out empty.
    #[error("bad neighbor matrix: empty column")]
    EmptyColumn,

    /// Neighborhood exploration produced no neighbors for a point.
    #[error("failure in neighborhood exploration")]
    ExplorationFailure,
}

/// Result type alias for graph construction operations.
pub type Result<T> = std::result::Result<T, GraphError>;
