//! Random-projection tree construction.
//!
//! Each tree recursively partitions the point set with random hyperplanes:
//! two distinct points are drawn, the splitting plane passes through their
//! midpoint with the connecting segment as its normal, and points are routed
//! by the sign of their projection against the median. Points that end up in
//! the same leaf become mutual neighbor candidates.

use log::debug;
use rand::Rng;

use crate::core::PointSet;
use crate::distance::norm;
use crate::error::{GraphError, Result};
use crate::pool::TreeDelta;
use crate::progress::ProgressTracker;

/// Grow one tree over `indices`, recording co-leaf candidates into `delta`.
///
/// Base cases, checked in order: an observed abort returns early; a node
/// with fewer than two points is a construction bug and fails the build; a
/// two-point node records a mutual pair; a node below `leaf_threshold` (or
/// out of recursion budget) records all its pairs as a leaf.
pub fn grow_tree<R: Rng>(
    points: &PointSet,
    indices: &[u32],
    leaf_threshold: usize,
    depth_remaining: usize,
    rng: &mut R,
    delta: &mut TreeDelta,
    progress: &ProgressTracker,
) -> Result<()> {
    if progress.check_abort() {
        return Ok(());
    }
    let n = indices.len();
    if n < 2 {
        progress.cancel();
        return Err(GraphError::TreeSplit);
    }
    if n == 2 {
        delta.record_pair(indices[0], indices[1]);
        return Ok(());
    }
    if n < leaf_threshold || depth_remaining == 0 {
        delta.record_leaf(indices);
        progress.increment(n);
        return Ok(());
    }

    // Random hyperplane through the midpoint of two distinct points, with
    // the connecting segment as its normal.
    let a = rng.random_range(0..n);
    let mut b = rng.random_range(0..n);
    while b == a {
        b = (b + 1) % n;
    }
    let xa = points.point(indices[a] as usize);
    let xb = points.point(indices[b] as usize);

    let mut normal: Vec<f64> = xa.iter().zip(xb).map(|(p, q)| p - q).collect();
    let length = norm(&normal);
    for v in normal.iter_mut() {
        *v /= length;
    }
    let base: Vec<f64> = xa.iter().zip(xb).map(|(p, q)| (p + q) / 2.0).collect();

    let projections: Vec<f64> = indices
        .iter()
        .map(|&i| {
            let x = points.point(i as usize);
            x.iter()
                .zip(&base)
                .zip(&normal)
                .map(|((xi, mi), vi)| (xi - mi) * vi)
                .sum()
        })
        .collect();

    let tau = median(&projections);

    // Ties go right.
    let mut left: Vec<u32> = Vec::new();
    let mut right: Vec<u32> = Vec::new();
    for (pos, &i) in indices.iter().enumerate() {
        if projections[pos] > tau {
            left.push(i);
        } else {
            right.push(i);
        }
    }

    if left.len() >= 2 && right.len() >= 2 {
        grow_tree(points, &left, leaf_threshold, depth_remaining - 1, rng, delta, progress)?;
        grow_tree(points, &right, leaf_threshold, depth_remaining - 1, rng, delta, progress)?;
    } else {
        // Degenerate geometry: the hyperplane failed to separate. Bisect
        // positionally with an overlapping middle element, which keeps both
        // halves at two or more points whenever the node has three.
        debug!("hyperplane failed to separate {} points; bisecting positionally", n);
        let mid = n / 2;
        grow_tree(
            points,
            &indices[..=mid],
            leaf_threshold,
            depth_remaining - 1,
            rng,
            delta,
            progress,
        )?;
        grow_tree(
            points,
            &indices[mid..],
            leaf_threshold,
            depth_remaining - 1,
            rng,
            delta,
            progress,
        )?;
    }
    Ok(())
}

/// Median of a slice; even-length inputs average the two middle values.
pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
