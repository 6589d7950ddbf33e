//! Construction entry point: parameter builder and pipeline orchestrator.
//!
//! The pipeline sequences: pool init → forest build → top-K′ reduction →
//! M refinement iterations → emit. Cancellation observed between phases
//! yields the empty graph; callers distinguish it from success by matrix
//! dimensions.

use std::sync::Mutex;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::core::PointSet;
use crate::distance::DistanceKind;
use crate::error::{GraphError, Result};
use crate::graph::KnnGraph;
use crate::pool::{CandidatePools, TreeDelta};
use crate::progress::ProgressTracker;
use crate::refine::refine_iteration;
use crate::tree::grow_tree;

/// Configures and runs approximate k-NN graph construction.
///
/// A good starting point for datasets in the tens of thousands is to keep
/// `leaf_threshold` at 2–3× the requested `k` so the reduction leaves
/// refinement some slack, and to grow more trees rather than deeper ones
/// when recall is short.
pub struct KnnGraphBuilder {
    /// K′: candidates kept per point after the forest (also the leaf size cap).
    leaf_threshold: usize,
    n_trees: usize,
    /// K: neighbors per point in the final graph.
    k: usize,
    max_depth: usize,
    max_refine_iters: usize,
    distance: DistanceKind,
    seed: Option<u64>,
    verbose: bool,
}

impl Default for KnnGraphBuilder {
    fn default() -> Self {
        debug!("Creating KnnGraphBuilder with default parameters");
        Self {
            leaf_threshold: 32,
            n_trees: 16,
            k: 10,
            max_depth: 32,
            max_refine_iters: 1,
            distance: DistanceKind::Euclidean,
            seed: None,
            verbose: false,
        }
    }
}

impl KnnGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// K′: candidates kept per point after the forest build; also caps tree
    /// leaf size. Must be at least 3 and at least `k`.
    pub fn with_leaf_threshold(mut self, leaf_threshold: usize) -> Self {
        info!("Configuring leaf threshold: {}", leaf_threshold);
        self.leaf_threshold = leaf_threshold;
        self
    }

    /// Number of random-projection trees in the forest.
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        info!("Configuring forest size: {} trees", n_trees);
        self.n_trees = n_trees;
        self
    }

    /// K: neighbors per point in the final graph.
    pub fn with_neighbors(mut self, k: usize) -> Self {
        info!("Configuring neighbor count: {}", k);
        self.k = k;
        self
    }

    /// Maximum tree recursion depth; nodes out of budget become leaves.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        info!("Configuring max recursion depth: {}", max_depth);
        self.max_depth = max_depth;
        self
    }

    /// Number of neighbors-of-neighbors refinement iterations.
    pub fn with_refine_iters(mut self, max_refine_iters: usize) -> Self {
        info!("Configuring refinement iterations: {}", max_refine_iters);
        self.max_refine_iters = max_refine_iters;
        self
    }

    pub fn with_distance(mut self, distance: DistanceKind) -> Self {
        info!("Configuring distance: {:?}", distance);
        self.distance = distance;
        self
    }

    /// Select the distance by name; unknown names fall back to Euclidean.
    pub fn with_distance_name(self, name: &str) -> Self {
        self.with_distance(DistanceKind::from_name(name))
    }

    /// Fix the forest RNG seed. With a fixed seed the output is
    /// byte-identical across runs regardless of thread scheduling, because
    /// each tree derives its own generator from `seed + tree_index` and the
    /// pool store canonicalizes merge order.
    pub fn with_seed(mut self, seed: u64) -> Self {
        info!("Configuring RNG seed: {}", seed);
        self.seed = Some(seed);
        self
    }

    /// Report progress milestones through `log` during construction.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self, points: &PointSet) -> Result<()> {
        if self.leaf_threshold < 3 {
            return Err(GraphError::InvalidParameter(format!(
                "leaf_threshold must be at least 3, got {}",
                self.leaf_threshold
            )));
        }
        if self.n_trees < 1 {
            return Err(GraphError::InvalidParameter("n_trees must be at least 1".into()));
        }
        if self.k < 1 {
            return Err(GraphError::InvalidParameter("k must be at least 1".into()));
        }
        if self.k > self.leaf_threshold {
            return Err(GraphError::InvalidParameter(format!(
                "k ({}) must not exceed leaf_threshold ({})",
                self.k, self.leaf_threshold
            )));
        }
        if self.max_depth < 1 {
            return Err(GraphError::InvalidParameter("max_depth must be at least 1".into()));
        }
        if points.npoints() < 2 {
            return Err(GraphError::InvalidParameter(
                "point set must contain at least two points".into(),
            ));
        }
        Ok(())
    }

    /// Total work estimate for a build over `points`, in progress units.
    pub fn work_estimate(&self, points: &PointSet) -> usize {
        let n = points.npoints();
        n * self.n_trees + n + n * self.max_refine_iters
    }

    /// Build the approximate k-NN graph.
    pub fn build(&self, points: &PointSet) -> Result<KnnGraph> {
        let progress = ProgressTracker::new(self.work_estimate(points), self.verbose);
        self.build_with_progress(points, &progress)
    }

    /// Build with a caller-owned progress tracker, allowing cancellation and
    /// progress polling from another thread. A pre-raised abort flag yields
    /// the empty graph immediately.
    pub fn build_with_progress(
        &self,
        points: &PointSet,
        progress: &ProgressTracker,
    ) -> Result<KnnGraph> {
        self.validate(points)?;
        let n = points.npoints();
        info!(
            "Building approximate k-NN graph: {} points, {} features, {} trees, K'={}, K={}, {} refinement iterations",
            n,
            points.nfeatures(),
            self.n_trees,
            self.leaf_threshold,
            self.k,
            self.max_refine_iters
        );

        let seed = self.seed.unwrap_or_else(rand::random);
        debug!("Forest RNG base seed: {}", seed);

        // Phase 1: forest build. One task per tree; each tree accumulates a
        // private delta, merged serially into the shared store.
        let pools = Mutex::new(CandidatePools::seeded(n));
        let all_indices: Vec<u32> = (0..n as u32).collect();
        (0..self.n_trees)
            .into_par_iter()
            .try_for_each(|t| -> Result<()> {
                if progress.check_abort() {
                    return Ok(());
                }
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let mut delta = TreeDelta::new();
                grow_tree(
                    points,
                    &all_indices,
                    self.leaf_threshold,
                    self.max_depth,
                    &mut rng,
                    &mut delta,
                    progress,
                )?;
                if progress.check_abort() {
                    return Ok(());
                }
                let mut store = pools.lock().expect("candidate pool store lock poisoned");
                store.merge(delta).map_err(|e| {
                    progress.cancel();
                    e
                })
            })?;

        if progress.check_abort() {
            info!("construction cancelled during forest build");
            return Ok(KnnGraph::empty());
        }
        let pools = pools
            .into_inner()
            .expect("candidate pool store lock poisoned")
            .into_pools();

        // Phase 2: top-K' reduction of the frozen pools.
        info!("Forest complete; reducing pools to the {} nearest candidates", self.leaf_threshold);
        let mut knns =
            KnnGraph::from_pools(points, self.distance, &pools, self.leaf_threshold, progress)?;
        if progress.check_abort() {
            info!("construction cancelled during reduction");
            return Ok(KnnGraph::empty());
        }

        // Phase 3: neighborhood refinement, double-buffered per iteration.
        for iteration in 0..self.max_refine_iters {
            debug!("Neighborhood refinement iteration {}", iteration + 1);
            knns = refine_iteration(points, self.distance, &pools, &knns, self.k, progress)?;
            if progress.check_abort() {
                info!("construction cancelled during refinement");
                return Ok(KnnGraph::empty());
            }
        }

        // With no refinement requested the reduction matrix is still K'-wide
        // and lists every point in its own column; emit a K-wide view
        // without self-edges instead.
        if self.max_refine_iters == 0 {
            knns = knns.shrink_to(self.k);
        }

        info!("k-NN graph complete: {}×{}", knns.k(), knns.npoints());
        Ok(knns)
    }
}
