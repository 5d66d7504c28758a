//! Memory page
//!
//! A single region split into equal-size chunks. A bitmap tracks which
//! chunks are in use; contiguous runs are handed out first-fit.
//!
//! All bitmap access goes through one lock. Allocation only ever tries it
//! once, so a contended page is skipped instead of waited on. Release spins
//! until it gets the lock: a clear must never be refused, or the run leaks.

use crossbeam::utils::Backoff;
use parking_lot::{Mutex, MutexGuard};
use std::ptr::NonNull;
use tracing::{trace, warn};

use super::bitmap::ChunkBitmap;
use super::region::{Region, RegionId};
use crate::error::{PoolError, ReleaseError};

/// A contiguous run of chunks within one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRun {
    pub start: usize,
    pub count: usize,
}

/// Usage summary of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageUsage {
    pub index: usize,
    pub chunk_count: usize,
    pub used_chunks: usize,
    pub largest_free_run: usize,
}

/// One fixed-capacity page of chunks
#[derive(Debug)]
pub struct Page {
    index: usize,
    region: Region,
    chunk_size: usize,
    chunk_count: usize,
    track: Mutex<ChunkBitmap>,
}

impl Page {
    /// Create a page of `capacity` bytes cut into `chunk_size` chunks.
    ///
    /// Trailing bytes that do not fill a whole chunk are never handed out.
    pub fn new(index: usize, capacity: usize, chunk_size: usize) -> Result<Self, PoolError> {
        if chunk_size == 0 {
            return Err(PoolError::InvalidGeometry(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if capacity < chunk_size {
            return Err(PoolError::InvalidGeometry(format!(
                "page capacity {capacity} is smaller than chunk size {chunk_size}"
            )));
        }

        let region = Region::allocate(capacity)?;
        let chunk_count = capacity / chunk_size;

        Ok(Self {
            index,
            region,
            chunk_size,
            chunk_count,
            track: Mutex::new(ChunkBitmap::new(chunk_count)),
        })
    }

    /// Try to claim `count` contiguous chunks.
    ///
    /// Returns `None` if the page is busy, `count` is out of range, or no
    /// free run is long enough. None of these are errors; the caller should
    /// try another page.
    pub fn try_allocate(&self, count: usize) -> Option<ChunkRun> {
        if count == 0 || count > self.chunk_count {
            return None;
        }

        let Some(mut track) = self.track.try_lock() else {
            trace!(page = self.index, "page busy, skipping");
            return None;
        };

        let start = track.first_fit(count)?;
        track.set_run(start, count);
        Some(ChunkRun { start, count })
    }

    /// Clear `count` chunks starting at `start` if `owner` is this page's region.
    ///
    /// `NotOwner` is returned before any locking so the caller can move on
    /// to the next page. A run that is out of range or not fully allocated
    /// is rejected without touching the bitmap.
    pub fn release(&self, owner: RegionId, start: usize, count: usize) -> Result<(), ReleaseError> {
        if owner != self.region.id() {
            return Err(ReleaseError::NotOwner);
        }

        let in_bounds = count > 0
            && start
                .checked_add(count)
                .is_some_and(|end| end <= self.chunk_count);
        if !in_bounds {
            warn!(page = self.index, start, count, "release outside page bounds");
            return Err(ReleaseError::OutOfBounds {
                start,
                count,
                chunk_count: self.chunk_count,
            });
        }

        let mut track = self.lock_blocking();
        if let Some(chunk) = track.first_clear_in(start, count) {
            drop(track);
            warn!(page = self.index, start, count, chunk, "release of unallocated chunk rejected");
            return Err(ReleaseError::NotAllocated { chunk });
        }
        track.clear_run(start, count);
        Ok(())
    }

    /// Spin on the try-lock, backing off and yielding the thread, until it is ours
    fn lock_blocking(&self) -> MutexGuard<'_, ChunkBitmap> {
        let backoff = Backoff::new();
        loop {
            if let Some(guard) = self.track.try_lock() {
                return guard;
            }
            backoff.snooze();
        }
    }

    /// Start of the memory backing `run`
    pub(crate) fn run_ptr(&self, run: ChunkRun) -> NonNull<u8> {
        self.region
            .sub_view(run.start * self.chunk_size, run.count * self.chunk_size)
    }

    /// Position of this page in its pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// Owner token of this page's region
    pub fn id(&self) -> RegionId {
        self.region.id()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Region capacity in bytes, including any unaddressable tail
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn used_chunks(&self) -> usize {
        self.lock_blocking().count_ones()
    }

    pub fn free_chunks(&self) -> usize {
        self.chunk_count - self.used_chunks()
    }

    pub fn largest_free_run(&self) -> usize {
        self.lock_blocking().largest_free_run()
    }

    pub fn is_chunk_used(&self, chunk: usize) -> bool {
        chunk < self.chunk_count && self.lock_blocking().get(chunk)
    }

    /// Copy of the current usage bitmap
    pub fn bitmap(&self) -> ChunkBitmap {
        self.lock_blocking().clone()
    }

    /// Usage summary taken under a single lock
    pub fn usage(&self) -> PageUsage {
        let track = self.lock_blocking();
        PageUsage {
            index: self.index,
            chunk_count: self.chunk_count,
            used_chunks: track.count_ones(),
            largest_free_run: track.largest_free_run(),
        }
    }
}
