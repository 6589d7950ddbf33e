//! The K×N neighbor matrix and its graph exports.
//!
//! `KnnGraph` stores neighbor indices column-major: column `i` lists point
//! `i`'s retained neighbors, with the sentinel `-1` marking unfilled slots.
//! Columns are drained from a bounded max-heap, so slot 0 holds the farthest
//! retained neighbor; consumers should rely on set membership only, not on
//! slot order.
//!
//! For spectral downstream use the matrix can be exported as a symmetric
//! sparse adjacency or Laplacian with kernel weights.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, trace};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::core::PointSet;
use crate::distance::DistanceKind;
use crate::error::{GraphError, Result};
use crate::heap::BoundedMaxHeap;
use crate::progress::ProgressTracker;

/// Sentinel marking an unfilled neighbor slot.
pub const NO_NEIGHBOR: i32 = -1;

/// Approximate k-nearest-neighbor graph over N points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnnGraph {
    pub(crate) data: Vec<i32>,
    k: usize,
    npoints: usize,
}

impl KnnGraph {
    /// The empty graph, returned when construction is cancelled.
    pub fn empty() -> Self {
        Self { data: Vec::new(), k: 0, npoints: 0 }
    }

    /// A k×npoints matrix with every slot set to the sentinel.
    pub(crate) fn filled(k: usize, npoints: usize) -> Self {
        Self { data: vec![NO_NEIGHBOR; k * npoints], k, npoints }
    }

    /// Neighbor slots per point (matrix rows).
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of points (matrix columns).
    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Whether this is the empty (cancelled) graph.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw view of column `i`, sentinels included.
    pub fn column(&self, i: usize) -> &[i32] {
        assert!(i < self.npoints, "column index {} out of bounds for {} points", i, self.npoints);
        &self.data[i * self.k..(i + 1) * self.k]
    }

    /// Neighbor indices of point `i`, stopping at the first sentinel.
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.column(i)
            .iter()
            .take_while(|&&j| j != NO_NEIGHBOR)
            .map(|&j| j as usize)
    }

    /// Reduce the candidate pools to the `width` nearest candidates per
    /// point by true distance, one bounded max-heap per point.
    ///
    /// Columns are written in parallel; each task reads only its own frozen
    /// pool. Skipped (aborted) columns are left as sentinels.
    pub(crate) fn from_pools(
        points: &PointSet,
        distance: DistanceKind,
        pools: &[Vec<u32>],
        width: usize,
        progress: &ProgressTracker,
    ) -> Result<Self> {
        let n = points.npoints();
        debug!("Reducing {} candidate pools to width {}", n, width);

        let mut graph = Self::filled(width, n);
        graph
            .data
            .par_chunks_mut(width)
            .enumerate()
            .try_for_each(|(i, column)| -> Result<()> {
                if !progress.increment(1) {
                    return Ok(());
                }
                let x_i = points.point(i);
                let mut heap = BoundedMaxHeap::with_capacity(width);
                for &c in &pools[i] {
                    let d = distance.eval(x_i, points.point(c as usize));
                    heap.push(d, c);
                }
                let mut slot = 0;
                while slot < width {
                    match heap.pop() {
                        Some(entry) => {
                            column[slot] = entry.index as i32;
                            slot += 1;
                        }
                        None => break,
                    }
                }
                if column[0] == NO_NEIGHBOR {
                    progress.cancel();
                    return Err(GraphError::EmptyColumn);
                }
                Ok(())
            })?;
        Ok(graph)
    }

    /// Shrink every column to its `k` nearest retained entries, dropping the
    /// point's own index. Used to emit a K-wide result when no refinement
    /// iterations are requested.
    ///
    /// Columns are drained farthest-first, so the nearest entries are the
    /// last non-sentinel slots.
    pub(crate) fn shrink_to(&self, k: usize) -> Self {
        let mut out = Self::filled(k, self.npoints);
        for i in 0..self.npoints {
            let kept: Vec<i32> = self
                .column(i)
                .iter()
                .copied()
                .filter(|&j| j != NO_NEIGHBOR && j as usize != i)
                .collect();
            let skip = kept.len().saturating_sub(k);
            let column = &mut out.data[i * k..(i + 1) * k];
            for (slot, &j) in kept[skip..].iter().enumerate() {
                column[slot] = j;
            }
        }
        out
    }

    /// Export a symmetric sparse Laplacian L = D − A over the neighbor
    /// graph, with kernel weights `w = 1 / (1 + (d/σ)^p)` on retained edges
    /// and union symmetrization.
    pub fn to_laplacian(
        &self,
        points: &PointSet,
        distance: DistanceKind,
        sigma: Option<f64>,
        p: f64,
    ) -> CsMat<f64> {
        let n = self.npoints;
        let sigma = sigma.unwrap_or(1.0);
        info!("Exporting neighbor graph to sparse Laplacian for {} nodes", n);

        let mut adj = vec![BTreeMap::<usize, f64>::new(); n];
        for i in 0..n {
            let x_i = points.point(i);
            for j in self.neighbors(i) {
                if i == j {
                    continue;
                }
                let d = distance.eval(x_i, points.point(j));
                let w = 1.0 / (1.0 + (d / sigma).powf(p));
                if w > 1e-15 {
                    adj[i].insert(j, w);
                }
            }
        }

        trace!("Symmetrizing adjacency by union");
        for i in 0..n {
            let keys: Vec<_> = adj[i].keys().copied().collect();
            for j in keys {
                let w = *adj[i].get(&j).unwrap_or(&0.0);
                if w > 1e-15 {
                    let back = adj[j].entry(i).or_insert(0.0);
                    if *back < 1e-15 {
                        *back = w;
                    }
                }
            }
        }

        let mut triplets = TriMat::new((n, n));
        for (i, row) in adj.iter().enumerate() {
            let degree: f64 = row.values().sum();
            triplets.add_triplet(i, i, degree);
            for (&j, &w) in row.iter() {
                if i != j {
                    triplets.add_triplet(i, j, -w);
                }
            }
        }

        let laplacian = triplets.to_csr();
        debug!("Laplacian export: {} non-zeros", laplacian.nnz());
        laplacian
    }

    /// Fill statistics over the neighbor matrix.
    pub fn statistics(&self) -> KnnGraphStats {
        let sentinels = self.data.iter().filter(|&&j| j == NO_NEIGHBOR).count();
        let total = self.data.len();
        KnnGraphStats {
            k: self.k,
            npoints: self.npoints,
            filled: total - sentinels,
            sentinels,
            fill_ratio: if total > 0 { (total - sentinels) as f64 / total as f64 } else { 0.0 },
        }
    }
}

/// Fill statistics for a neighbor matrix.
#[derive(Debug, Clone)]
pub struct KnnGraphStats {
    pub k: usize,
    pub npoints: usize,
    pub filled: usize,
    pub sentinels: usize,
    pub fill_ratio: f64,
}

impl fmt::Display for KnnGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KnnGraph ({}×{}):", self.k, self.npoints)?;
        if self.is_empty() {
            return writeln!(f, "(empty)");
        }
        if self.npoints <= 10 {
            for i in 0..self.npoints {
                writeln!(f, "Point {}: {:?}", i, self.column(i))?;
            }
        } else {
            let stats = self.statistics();
            writeln!(f, "Matrix too large to display ({} points)", self.npoints)?;
            writeln!(
                f,
                "Filled slots: {} ({:.2}% of {})",
                stats.filled,
                stats.fill_ratio * 100.0,
                stats.filled + stats.sentinels
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for KnnGraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KnnGraph Statistics:")?;
        writeln!(f, "  Shape: {}×{}", self.k, self.npoints)?;
        writeln!(f, "  Filled slots: {}", self.filled)?;
        writeln!(f, "  Sentinel slots: {}", self.sentinels)?;
        writeln!(f, "  Fill ratio: {:.4}", self.fill_ratio)?;
        Ok(())
    }
}
