//! Page memory regions
//!
//! One zeroed, address-stable heap block per page. Regions are allocated
//! once at pool construction and never resized or moved.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PoolError;

/// Regions start on a cache line
const REGION_ALIGN: usize = 64;

static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a region, used as the owner token on release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u64);

impl RegionId {
    fn next() -> Self {
        Self(NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// A fixed-capacity block of raw memory
pub struct Region {
    ptr: NonNull<u8>,
    layout: Layout,
    id: RegionId,
}

// The region never hands out references to itself. Buffers receive raw
// sub-views whose ranges are kept disjoint by the owning page's bitmap.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Allocate a zeroed region of `capacity` bytes
    pub fn allocate(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidGeometry(
                "region capacity must be > 0".to_string(),
            ));
        }

        let layout = Layout::from_size_align(capacity, REGION_ALIGN).map_err(|_| {
            PoolError::InvalidGeometry(format!("region capacity {capacity} is too large"))
        })?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(PoolError::RegionAlloc { capacity })?;

        Ok(Self {
            ptr,
            layout,
            id: RegionId::next(),
        })
    }

    /// Get the owner token
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Get the capacity in bytes
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Base address of the region
    pub fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Pointer to the start of `[offset, offset + len)`
    pub(crate) fn sub_view(&self, offset: usize, len: usize) -> NonNull<u8> {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.capacity()),
            "sub-view {offset}+{len} outside region of {} bytes",
            self.capacity()
        );
        // SAFETY: offset is within the allocation, checked above.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("base", &self.ptr)
            .field("capacity", &self.capacity())
            .finish()
    }
}
