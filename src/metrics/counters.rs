//! Atomic counters for pool operations
//!
//! Lock-free counters updated on the allocate/recycle paths. Each pool owns
//! its own set, so independent pools report independently.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-pool operation counters
#[derive(Debug, Default)]
pub struct PoolMetrics {
    // Allocation
    pub allocations: AtomicU64,
    pub allocation_misses: AtomicU64,

    // Release
    pub recycles: AtomicU64,
    pub drop_returns: AtomicU64,
    pub recycle_misses: AtomicU64,
    pub release_rejections: AtomicU64,

    // Occupancy
    pub chunks_in_use: AtomicU64,
}

impl PoolMetrics {
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            allocation_misses: AtomicU64::new(0),
            recycles: AtomicU64::new(0),
            drop_returns: AtomicU64::new(0),
            recycle_misses: AtomicU64::new(0),
            release_rejections: AtomicU64::new(0),
            chunks_in_use: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn allocated(&self, chunks: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.chunks_in_use.fetch_add(chunks as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn allocation_missed(&self) {
        self.allocation_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn recycled(&self, chunks: usize) {
        self.recycles.fetch_add(1, Ordering::Relaxed);
        self.chunks_in_use.fetch_sub(chunks as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn buffer_dropped(&self, chunks: usize) {
        self.drop_returns.fetch_add(1, Ordering::Relaxed);
        self.chunks_in_use.fetch_sub(chunks as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn recycle_missed(&self) {
        self.recycle_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// The run is written off: the buffer is gone whether or not the page
    /// cleared it, so it no longer counts as in use.
    #[inline]
    pub fn release_rejected(&self, chunks: usize) {
        self.release_rejections.fetch_add(1, Ordering::Relaxed);
        self.chunks_in_use.fetch_sub(chunks as u64, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_misses: self.allocation_misses.load(Ordering::Relaxed),
            recycles: self.recycles.load(Ordering::Relaxed),
            drop_returns: self.drop_returns.load(Ordering::Relaxed),
            recycle_misses: self.recycle_misses.load(Ordering::Relaxed),
            release_rejections: self.release_rejections.load(Ordering::Relaxed),
            chunks_in_use: self.chunks_in_use.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool counters for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub allocations: u64,
    pub allocation_misses: u64,
    pub recycles: u64,
    pub drop_returns: u64,
    pub recycle_misses: u64,
    pub release_rejections: u64,
    pub chunks_in_use: u64,
}

impl MetricsSnapshot {
    /// Buffers handed out and not yet returned
    pub fn outstanding(&self) -> u64 {
        self.allocations
            .saturating_sub(self.recycles + self.drop_returns + self.release_rejections)
    }
}
