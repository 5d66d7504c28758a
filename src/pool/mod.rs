//! Memory pool management
//!
//! Fixed pages of pre-allocated memory, carved into chunk runs on demand.
//! No page is grown, shrunk, or compacted after construction.

mod bitmap;
mod buffer;
mod page;
mod page_pool;
mod region;

pub use bitmap::ChunkBitmap;
pub use buffer::{Buffer, ChunkHandle};
pub use page::{ChunkRun, Page, PageUsage};
pub use page_pool::{BufferPool, ProbeOrder};
pub use region::{Region, RegionId};
