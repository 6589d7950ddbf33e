//! rpforest: approximate k-nearest-neighbor graphs via random-projection
//! forests and neighborhood exploration.
//!
//! The construction runs in two phases over a dense D×N point matrix:
//!
//! 1. A forest of randomized binary partitions ([`tree`]) accumulates a
//!    per-point pool of co-leaf candidates ([`pool`]).
//! 2. Each pool is pruned to the nearest candidates by true distance, then
//!    iteratively improved by neighbors-of-neighbors expansion ([`refine`]).
//!
//! The result is a K×N integer matrix of neighbor indices ([`graph`]), with
//! the sentinel −1 marking unfilled slots — the shape graph-based embedding
//! and manifold-learning pipelines consume. Exact k-NN is O(N²D); the forest
//! trades a modest, empirical recall loss for large speed-ups.
//!
//! ```
//! use rpforest::builder::KnnGraphBuilder;
//! use rpforest::core::PointSet;
//!
//! let points = PointSet::from_points(vec![
//!     vec![0.0, 0.0],
//!     vec![1.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![10.0, 10.0],
//! ]);
//!
//! let graph = KnnGraphBuilder::new()
//!     .with_leaf_threshold(5)
//!     .with_trees(3)
//!     .with_neighbors(2)
//!     .with_seed(7)
//!     .build(&points)
//!     .unwrap();
//!
//! assert_eq!((graph.k(), graph.npoints()), (2, 4));
//! ```

pub mod builder;
pub mod core;
pub mod distance;
pub mod error;
pub mod graph;
pub mod heap;
pub mod pool;
pub mod progress;
pub mod refine;
pub mod tree;

pub use builder::KnnGraphBuilder;
pub use error::{GraphError, Result};
pub use graph::{KnnGraph, NO_NEIGHBOR};

pub mod tests;
