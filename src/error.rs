//! Error types
//!
//! Allocation misses are not errors: `allocate` returns `None` and the
//! caller decides whether to retry. Everything here is caller misuse or a
//! construction failure, and none of it is fatal.

use thiserror::Error;

use crate::pool::{Buffer, RegionId};

/// Why a page refused to clear a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReleaseError {
    /// The run belongs to another page's region
    #[error("page does not own the released region")]
    NotOwner,

    /// The run does not fit inside the page
    #[error("run {start}+{count} exceeds page of {chunk_count} chunks")]
    OutOfBounds {
        start: usize,
        count: usize,
        chunk_count: usize,
    },

    /// Part of the run is already clear (double release)
    #[error("chunk {chunk} is not allocated")]
    NotAllocated { chunk: usize },
}

/// Pool construction and recycle errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool geometry: {0}")]
    InvalidGeometry(String),

    #[error("failed to reserve {capacity} bytes of page memory")]
    RegionAlloc { capacity: usize },

    /// No page of this pool owns the buffer. The buffer is handed back so
    /// the caller can return it to the right pool; dropping it returns it to
    /// its own page.
    #[error("buffer from region {region} is not owned by this pool")]
    ForeignBuffer { region: RegionId, buffer: Buffer },

    #[error("page rejected release: {0}")]
    Release(#[from] ReleaseError),
}

impl PoolError {
    /// Take back the buffer carried by a `ForeignBuffer` error
    pub fn into_buffer(self) -> Option<Buffer> {
        match self {
            PoolError::ForeignBuffer { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}
