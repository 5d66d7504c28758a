//! Buffer pool over a fixed set of pages
//!
//! All pages share one chunk size. Allocation rotates its starting page so
//! load spreads across pages instead of piling onto page 0, and never waits
//! on a busy page. Recycling finds the owning page from the buffer's handle.

use serde::Deserialize;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::buffer::Buffer;
use super::page::{Page, PageUsage};
use crate::config::PoolConfig;
use crate::error::{PoolError, ReleaseError};
use crate::metrics::{MetricsSnapshot, PoolMetrics};

/// Order in which pages are probed relative to the rotating pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOrder {
    /// `[0, pivot)` then `[pivot, pages)`, matching the legacy allocator
    #[default]
    Split,
    /// `[pivot, pages)` then `[0, pivot)`
    Wrapping,
}

/// Pool of equally-chunked pages
#[derive(Debug)]
pub struct BufferPool {
    pages: Box<[Arc<Page>]>,
    chunk_size: usize,
    page_capacity: usize,
    chunks_per_page: usize,
    probe_order: ProbeOrder,
    /// Index of the page that last satisfied an allocation
    cursor: AtomicUsize,
    metrics: Arc<PoolMetrics>,
}

impl BufferPool {
    /// Create a pool of `page_count` pages of `page_capacity` bytes each
    pub fn new(page_capacity: usize, chunk_size: usize, page_count: usize) -> Result<Self, PoolError> {
        Self::with_probe_order(page_capacity, chunk_size, page_count, ProbeOrder::default())
    }

    /// Create a pool from configuration
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        Self::with_probe_order(
            config.page_capacity,
            config.chunk_size,
            config.page_count,
            config.probe_order,
        )
    }

    /// Create a pool with an explicit probe order
    pub fn with_probe_order(
        page_capacity: usize,
        chunk_size: usize,
        page_count: usize,
        probe_order: ProbeOrder,
    ) -> Result<Self, PoolError> {
        if page_count == 0 {
            return Err(PoolError::InvalidGeometry(
                "page_count must be > 0".to_string(),
            ));
        }

        let pages = (0..page_count)
            .map(|index| Page::new(index, page_capacity, chunk_size).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();

        let chunks_per_page = pages[0].chunk_count();
        let unaddressable = page_capacity - chunks_per_page * chunk_size;
        if unaddressable > 0 {
            debug!(unaddressable, "page capacity is not a multiple of chunk size");
        }

        info!(
            page_count,
            page_capacity,
            chunk_size,
            chunks_per_page,
            probe_order = ?probe_order,
            "Buffer pool ready"
        );

        Ok(Self {
            pages,
            chunk_size,
            page_capacity,
            chunks_per_page,
            probe_order,
            cursor: AtomicUsize::new(0),
            metrics: Arc::new(PoolMetrics::new()),
        })
    }

    /// Allocate a buffer of at least `size` bytes.
    ///
    /// The buffer's capacity is `size` rounded up to whole chunks. Returns
    /// `None` when no page has a long enough free run or every candidate
    /// page was busy; the caller owns any retry policy.
    pub fn allocate(&self, size: usize) -> Option<Buffer> {
        let chunk_count = size.div_ceil(self.chunk_size);
        if chunk_count == 0 || chunk_count > self.chunks_per_page {
            debug!(size, chunk_count, "allocation size out of range");
            self.metrics.allocation_missed();
            return None;
        }

        let page_count = self.pages.len();
        let pivot = self
            .cursor
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
            % page_count;

        let (first, second) = match self.probe_order {
            ProbeOrder::Split => (0..pivot, pivot..page_count),
            ProbeOrder::Wrapping => (pivot..page_count, 0..pivot),
        };

        let buffer = self
            .probe(first, chunk_count)
            .or_else(|| self.probe(second, chunk_count));

        match buffer {
            Some(buffer) => {
                self.metrics.allocated(chunk_count);
                Some(buffer)
            }
            None => {
                debug!(size, chunk_count, "no page could satisfy allocation");
                self.metrics.allocation_missed();
                None
            }
        }
    }

    fn probe(&self, pages: Range<usize>, chunk_count: usize) -> Option<Buffer> {
        for index in pages {
            let page = &self.pages[index];
            if let Some(run) = page.try_allocate(chunk_count) {
                self.cursor.store(index, Ordering::Relaxed);
                return Some(Buffer::new(Arc::clone(page), run, Arc::clone(&self.metrics)));
            }
        }
        None
    }

    /// Return a buffer to the pool.
    ///
    /// Pages are asked in index order until one owns the buffer's region.
    /// A buffer no page owns is handed back in `PoolError::ForeignBuffer`
    /// and the pool is left untouched.
    pub fn recycle(&self, mut buffer: Buffer) -> Result<(), PoolError> {
        let handle = buffer.handle();

        for page in self.pages.iter() {
            match page.release(handle.region(), handle.start_chunk(), handle.chunk_count()) {
                Ok(()) => {
                    buffer.disarm();
                    self.metrics.recycled(handle.chunk_count());
                    return Ok(());
                }
                Err(ReleaseError::NotOwner) => continue,
                Err(error) => {
                    buffer.disarm();
                    self.metrics.release_rejected(handle.chunk_count());
                    return Err(error.into());
                }
            }
        }

        self.metrics.recycle_missed();
        warn!(
            region = %handle.region(),
            page = handle.page_index(),
            start_chunk = handle.start_chunk(),
            chunk_count = handle.chunk_count(),
            "Buffer not recycled: no page in this pool owns it"
        );
        Err(PoolError::ForeignBuffer {
            region: handle.region(),
            buffer,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_capacity(&self) -> usize {
        self.page_capacity
    }

    pub fn chunks_per_page(&self) -> usize {
        self.chunks_per_page
    }

    pub fn probe_order(&self) -> ProbeOrder {
        self.probe_order
    }

    /// Addressable bytes across all pages
    pub fn capacity(&self) -> usize {
        self.pages.len() * self.chunks_per_page * self.chunk_size
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Arc<Page>> {
        self.pages.get(index)
    }

    /// Bytes currently held by live buffers
    pub fn used_bytes(&self) -> usize {
        self.pages
            .iter()
            .map(|page| page.used_chunks() * self.chunk_size)
            .sum()
    }

    /// Per-page usage summaries
    pub fn usage(&self) -> Vec<PageUsage> {
        self.pages.iter().map(|page| page.usage()).collect()
    }

    /// Get pool counters
    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
