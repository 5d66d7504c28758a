//! Pooled buffers
//!
//! A `Buffer` is an exclusive view over one chunk run of one page. It
//! carries an explicit handle naming its owning region and run, which is
//! what the pool uses to find the page again on recycle.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::warn;

use super::page::{ChunkRun, Page};
use super::region::RegionId;
use crate::metrics::PoolMetrics;

/// Identifies the chunk run behind a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    region: RegionId,
    page_index: usize,
    start_chunk: usize,
    chunk_count: usize,
}

impl ChunkHandle {
    /// Owner token of the page the run lives in
    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn start_chunk(&self) -> usize {
        self.start_chunk
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

/// A buffer borrowed from a `BufferPool`
///
/// Return it with `BufferPool::recycle`. A buffer that is simply dropped
/// goes back to its own page.
pub struct Buffer {
    ptr: NonNull<u8>,
    len: usize,
    handle: ChunkHandle,
    /// `None` once the run has been returned
    page: Option<Arc<Page>>,
    metrics: Arc<PoolMetrics>,
}

// The run behind `ptr` is marked used in its page for as long as the buffer
// is armed, so no other buffer can alias it, and the page (and its region)
// is kept alive by `page`.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    pub(crate) fn new(page: Arc<Page>, run: ChunkRun, metrics: Arc<PoolMetrics>) -> Self {
        let ptr = page.run_ptr(run);
        let handle = ChunkHandle {
            region: page.id(),
            page_index: page.index(),
            start_chunk: run.start,
            chunk_count: run.count,
        };

        Self {
            ptr,
            len: run.count * page.chunk_size(),
            handle,
            page: Some(page),
            metrics,
        }
    }

    /// Get the buffer's capacity (always a whole number of chunks)
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Get the handle identifying this buffer's run
    pub fn handle(&self) -> ChunkHandle {
        self.handle
    }

    /// Stop the drop path from releasing the run; the caller has released it
    pub(crate) fn disarm(&mut self) {
        self.page = None;
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        // SAFETY: ptr..ptr+len lies within the page region and is owned
        // exclusively by this buffer (see the Send/Sync note above).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as in `deref`, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };

        let handle = self.handle;
        match page.release(handle.region, handle.start_chunk, handle.chunk_count) {
            Ok(()) => self.metrics.buffer_dropped(handle.chunk_count),
            Err(error) => {
                self.metrics.release_rejected(handle.chunk_count);
                warn!(%error, region = %handle.region, "dropped buffer could not be returned");
            }
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("capacity", &self.len)
            .field("armed", &self.page.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_on(page: &Arc<Page>, count: usize, metrics: &Arc<PoolMetrics>) -> Buffer {
        let run = page.try_allocate(count).unwrap();
        Buffer::new(Arc::clone(page), run, Arc::clone(metrics))
    }

    #[test]
    fn test_buffer_view() {
        let page = Arc::new(Page::new(0, 1024, 128).unwrap());
        let metrics = Arc::new(PoolMetrics::new());

        let _first = buffer_on(&page, 1, &metrics);
        let mut buf = buffer_on(&page, 3, &metrics);

        assert_eq!(buf.capacity(), 384);
        assert_eq!(buf.len(), 384);
        assert_eq!(buf.handle().start_chunk(), 1);
        assert_eq!(buf.handle().chunk_count(), 3);
        assert_eq!(buf.handle().region(), page.id());

        buf.fill(0xAB);
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_drop_returns_run() {
        let page = Arc::new(Page::new(0, 1024, 128).unwrap());
        let metrics = Arc::new(PoolMetrics::new());

        let buf = buffer_on(&page, 4, &metrics);
        assert_eq!(page.used_chunks(), 4);

        drop(buf);
        assert_eq!(page.used_chunks(), 0);
        assert_eq!(metrics.snapshot().drop_returns, 1);
    }

    #[test]
    fn test_disarmed_drop_leaves_page_alone() {
        let page = Arc::new(Page::new(0, 1024, 128).unwrap());
        let metrics = Arc::new(PoolMetrics::new());

        let mut buf = buffer_on(&page, 2, &metrics);
        buf.disarm();
        drop(buf);
        assert_eq!(page.used_chunks(), 2);
    }

    #[test]
    fn test_rejected_drop_releases_occupancy() {
        let page = Arc::new(Page::new(0, 1024, 128).unwrap());
        let metrics = Arc::new(PoolMetrics::new());

        let buf = buffer_on(&page, 3, &metrics);
        metrics.allocated(3);

        // Someone cleared the run behind the buffer's back
        page.release(page.id(), 0, 3).unwrap();
        drop(buf);

        let snap = metrics.snapshot();
        assert_eq!(snap.release_rejections, 1);
        assert_eq!(snap.chunks_in_use, 0);
        assert_eq!(snap.outstanding(), 0);
    }

    #[test]
    fn test_buffers_do_not_alias() {
        let page = Arc::new(Page::new(0, 512, 64).unwrap());
        let metrics = Arc::new(PoolMetrics::new());

        let mut a = buffer_on(&page, 2, &metrics);
        let mut b = buffer_on(&page, 2, &metrics);
        a.fill(1);
        b.fill(2);
        assert!(a.iter().all(|&x| x == 1));
        assert!(b.iter().all(|&x| x == 2));
    }
}
