//! Neighborhood-exploration refinement.
//!
//! The canonical nearest-neighbor-descent expansion: each iteration rebuilds
//! every point's neighbor column from its current neighbors and their
//! neighbors, keeping the K nearest by true distance in a bounded max-heap.
//!
//! A per-point visited set — a sorted vector probed by binary search and
//! extended with `insert` at the reported position — collapses redundant
//! distance evaluations when several neighbors share a neighbor. For the
//! small K·K candidate counts in play this beats a hashed set and keeps the
//! scan cache-friendly.
//!
//! Iterations are externally sequential and internally parallel: iteration t
//! reads only the frozen output of iteration t−1 and writes its own columns
//! independently.

use log::debug;
use rayon::prelude::*;

use crate::core::PointSet;
use crate::distance::DistanceKind;
use crate::error::{GraphError, Result};
use crate::graph::{KnnGraph, NO_NEIGHBOR};
use crate::heap::BoundedMaxHeap;
use crate::progress::ProgressTracker;

/// Run one refinement iteration, transforming `old` into a K-wide matrix.
///
/// Exact duplicates (distance 0) are skipped, never retained. A point whose
/// every candidate is a duplicate fails the build.
pub fn refine_iteration(
    points: &PointSet,
    distance: DistanceKind,
    pools: &[Vec<u32>],
    old: &KnnGraph,
    k: usize,
    progress: &ProgressTracker,
) -> Result<KnnGraph> {
    let n = points.npoints();
    debug!("Refinement pass over {} points (width {} -> {})", n, old.k(), k);

    let mut next = KnnGraph::filled(k, n);
    next.data
        .par_chunks_mut(k)
        .enumerate()
        .try_for_each(|(i, column)| -> Result<()> {
            if !progress.increment(1) {
                return Ok(());
            }
            let x_i = points.point(i);
            let mut heap = BoundedMaxHeap::with_capacity(k);
            // Indices whose distance to i has already been considered this
            // iteration, seeded from the frozen candidate pool.
            let mut visited: Vec<u32> = pools[i].to_vec();

            for &j_slot in old.column(i) {
                if j_slot == NO_NEIGHBOR {
                    break;
                }
                let j = j_slot as usize;
                if j == i {
                    continue;
                }
                let d = distance.eval(x_i, points.point(j));
                if d == 0.0 {
                    continue;
                }
                if !heap.contains(j as u32) {
                    heap.push(d, j as u32);
                }
                if let Err(pos) = visited.binary_search(&(j as u32)) {
                    visited.insert(pos, j as u32);
                }

                // Second hop: the neighbors of j.
                for &c_slot in old.column(j) {
                    if c_slot == NO_NEIGHBOR {
                        break;
                    }
                    let c = c_slot as usize;
                    if c == i {
                        continue;
                    }
                    match visited.binary_search(&(c as u32)) {
                        Ok(_) => continue,
                        Err(pos) => visited.insert(pos, c as u32),
                    }
                    let d = distance.eval(x_i, points.point(c));
                    if d == 0.0 {
                        continue;
                    }
                    heap.offer(d, c as u32);
                }
            }

            let mut slot = 0;
            while let Some(entry) = heap.pop() {
                column[slot] = entry.index as i32;
                slot += 1;
            }
            if slot == 0 {
                progress.cancel();
                return Err(GraphError::ExplorationFailure);
            }
            Ok(())
        })?;
    Ok(next)
}
