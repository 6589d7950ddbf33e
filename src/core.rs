//! Dense column-major point storage.
//!
//! This module provides the read-only container every construction phase
//! borrows:
//!
//! - `PointSet`: a dense, column-major D×N matrix of `f64` where column `i`
//!   is the feature vector of point `i`, supporting zero-copy column views
//!   and iteration.
//!
//! Design goals:
//! - Zero-copy access to points for distance-heavy inner loops (a column is
//!   one contiguous slice).
//! - Cheap sharing across worker threads: the set is immutable after
//!   construction and only ever borrowed.
//!
//! # Examples
//!
//! Create a small set and read a point back:
//!
//! ```
//! use rpforest::core::PointSet;
//!
//! let points = PointSet::from_points(vec![
//!     vec![1.0, 0.0, 0.0],
//!     vec![0.0, 1.0, 0.0],
//! ]);
//!
//! assert_eq!(points.npoints(), 2);
//! assert_eq!(points.nfeatures(), 3);
//! assert_eq!(points.point(1), &[0.0, 1.0, 0.0]);
//! ```
//!
//! # Panics
//!
//! - `from_points` panics on an empty input or inconsistent dimensionality.
//! - `point` panics on an out-of-bounds index.

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::debug;

/// An immutable set of N points in D-dimensional space, stored column-major
/// so that each point occupies one contiguous slice of the backing buffer.
#[derive(Clone, Debug)]
pub struct PointSet {
    data: Vec<f64>,
    nfeatures: usize,
    npoints: usize,
}

impl PointSet {
    /// Builds a set from owned per-point vectors (each inner vector is one
    /// point with D features).
    pub fn from_points(points: Vec<Vec<f64>>) -> Self {
        assert!(!points.is_empty(), "point set cannot be empty");
        let nfeatures = points[0].len();
        assert!(nfeatures >= 1, "points must have at least one feature");
        for point in &points {
            assert_eq!(
                point.len(),
                nfeatures,
                "all points must have identical number of features"
            );
        }

        let npoints = points.len();
        let mut data = Vec::with_capacity(npoints * nfeatures);
        for point in &points {
            data.extend_from_slice(point);
        }

        debug!("PointSet created: {} points with {} features", npoints, nfeatures);
        Self { data, nfeatures, npoints }
    }

    /// Builds a set from a `DenseMatrix` whose rows are points (N×D), the
    /// shape produced by the usual dataset loaders. The data is transposed
    /// into column-major storage.
    pub fn from_dense_matrix(matrix: &DenseMatrix<f64>) -> Self {
        let (npoints, nfeatures) = matrix.shape();
        assert!(
            npoints >= 1 && nfeatures >= 1,
            "matrix should be at least of shape (1,1): ({},{})",
            npoints,
            nfeatures
        );

        let mut data = Vec::with_capacity(npoints * nfeatures);
        for i in 0..npoints {
            for j in 0..nfeatures {
                data.push(*matrix.get((i, j)));
            }
        }

        debug!(
            "PointSet created from DenseMatrix: {} points with {} features",
            npoints, nfeatures
        );
        Self { data, nfeatures, npoints }
    }

    /// Number of points (columns).
    #[inline]
    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Number of features per point (rows).
    #[inline]
    pub fn nfeatures(&self) -> usize {
        self.nfeatures
    }

    /// Zero-copy view of point `i`.
    #[inline]
    pub fn point(&self, i: usize) -> &[f64] {
        assert!(i < self.npoints, "point index {} out of bounds for {} points", i, self.npoints);
        let start = i * self.nfeatures;
        &self.data[start..start + self.nfeatures]
    }

    /// Iterate over all points as slices, in index order.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.nfeatures)
    }
}
