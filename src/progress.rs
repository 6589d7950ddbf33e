//! Work accounting and cooperative cancellation shared by all workers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::info;

/// Shared progress counter with an abort flag polled at safe points.
///
/// The counter is monotonically non-decreasing and saturates at the total
/// work estimate. Workers poll `check_abort` at phase boundaries and at the
/// top of each tree call; once the flag is observed they return without
/// further writes. The flag is also raised as a side effect of any fatal
/// invariant violation, so in-flight siblings drain out at their next probe.
pub struct ProgressTracker {
    total: usize,
    done: AtomicUsize,
    aborted: AtomicBool,
    verbose: bool,
    last_decile: AtomicUsize,
}

impl ProgressTracker {
    /// Create a tracker for `total` units of work. With `verbose` set,
    /// completion is reported through `log` at each 10% milestone.
    pub fn new(total: usize, verbose: bool) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            verbose,
            last_decile: AtomicUsize::new(0),
        }
    }

    /// Advance the counter by `n` units. Returns `false` when the abort flag
    /// has been raised, in which case the counter is left untouched and the
    /// caller should skip its work item.
    pub fn increment(&self, n: usize) -> bool {
        if self.check_abort() {
            return false;
        }
        let done = self
            .done
            .fetch_add(n, Ordering::Relaxed)
            .saturating_add(n)
            .min(self.total);
        if self.verbose && self.total > 0 {
            let decile = done * 10 / self.total;
            let prev = self.last_decile.fetch_max(decile, Ordering::Relaxed);
            if decile > prev {
                info!("k-NN construction {}% complete", decile * 10);
            }
        }
        true
    }

    /// Whether the abort flag has been raised.
    #[inline]
    pub fn check_abort(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Raise the abort flag. Used both for caller-driven cancellation and by
    /// failing workers before they unwind, so that siblings exit promptly.
    pub fn cancel(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Units of work completed so far (capped at the total estimate).
    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed).min(self.total)
    }

    /// Total work estimate this tracker was created with.
    pub fn total(&self) -> usize {
        self.total
    }
}
