//! Per-point candidate pools accumulated across the tree forest.
//!
//! Every tree records its co-leaf pairs into a private `TreeDelta`; deltas
//! are merged into the shared store one at a time, so tree workers never
//! contend on the pools themselves. After each merge the pools are sorted
//! and deduplicated in place, which canonicalizes the unspecified tree-to-tree
//! append order.

use log::{debug, trace};

use crate::error::{GraphError, Result};

/// Candidate edges recorded by a single tree. `(i, j)` means "j entered the
/// candidate pool of i".
#[derive(Default)]
pub struct TreeDelta {
    edges: Vec<(u32, u32)>,
}

impl TreeDelta {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Record a mutual pair, the two-point leaf base case.
    pub fn record_pair(&mut self, a: u32, b: u32) {
        self.edges.push((a, b));
        self.edges.push((b, a));
    }

    /// Record all ordered pairs of a leaf's members.
    pub fn record_leaf(&mut self, members: &[u32]) {
        self.edges.reserve(members.len() * (members.len() - 1));
        for &i in members {
            for &j in members {
                if i != j {
                    self.edges.push((i, j));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// The shared store of N candidate pools, one per point.
///
/// Pool `i` is seeded with `i` itself and, once frozen after the forest
/// build, is sorted ascending and unique.
pub struct CandidatePools {
    pools: Vec<Vec<u32>>,
    merged_trees: usize,
}

impl CandidatePools {
    /// Create `npoints` pools, each seeded with its own point index.
    pub fn seeded(npoints: usize) -> Self {
        let pools = (0..npoints as u32).map(|i| vec![i]).collect();
        debug!("Candidate pool store seeded for {} points", npoints);
        Self { pools, merged_trees: 0 }
    }

    /// Merge one tree's delta, then sort and deduplicate every pool.
    ///
    /// The minimum-size invariant (`|P[i]| >= 3`) is only meaningful against
    /// accumulated state, so it is enforced once at least two trees have been
    /// merged.
    pub fn merge(&mut self, delta: TreeDelta) -> Result<()> {
        trace!("Merging tree delta with {} edges", delta.len());
        for (i, j) in delta.edges {
            self.pools[i as usize].push(j);
        }
        self.merged_trees += 1;
        self.normalize()
    }

    /// Sort and deduplicate every pool in place; idempotent.
    fn normalize(&mut self) -> Result<()> {
        for pool in &mut self.pools {
            pool.sort_unstable();
            pool.dedup();
        }
        if self.merged_trees >= 2 {
            if let Some(i) = self.pools.iter().position(|p| p.len() < 3) {
                debug!(
                    "pool {} exhausted after {} trees ({} entries)",
                    i,
                    self.merged_trees,
                    self.pools[i].len()
                );
                return Err(GraphError::PoolExhausted);
            }
        }
        Ok(())
    }

    /// Read access to pool `i`.
    pub fn pool(&self, i: usize) -> &[u32] {
        &self.pools[i]
    }

    /// Number of trees merged so far.
    pub fn merged_trees(&self) -> usize {
        self.merged_trees
    }

    /// Freeze the store, handing out the pools for the reduction and
    /// refinement phases.
    pub fn into_pools(self) -> Vec<Vec<u32>> {
        self.pools
    }
}
