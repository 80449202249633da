//! Shared progress counter for one scrape job

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time view of job progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Records extracted so far
    pub processed: u64,

    /// Records the listing announced; zero until pagination is resolved
    pub total: u64,
}

impl Progress {
    /// Completed share in `0.0..=1.0`, or `None` while the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.processed as f64 / self.total as f64).min(1.0))
    }
}

/// Thread-safe record counter shared between page workers and observers
///
/// Clones share the same counters. Each job owns its own tracker; nothing is
/// process-wide.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    processed: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one extracted offer
    pub fn record(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the expected number of records
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            processed: self.processed(),
            total: self.total(),
        }
    }
}
