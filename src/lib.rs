//! pagepool - slab-style allocator over fixed off-heap pages
//!
//! A `BufferPool` owns a fixed set of equally sized pages, each cut into
//! equal chunks. Callers ask for any number of bytes and get back a
//! `Buffer` covering a contiguous run of chunks in one page, without a
//! native allocation per request.
//!
//! ```
//! use pagepool::BufferPool;
//!
//! let pool = BufferPool::new(1024, 128, 2).unwrap();
//!
//! let mut buf = pool.allocate(300).unwrap();
//! assert_eq!(buf.capacity(), 384);
//! buf[..5].copy_from_slice(b"hello");
//!
//! pool.recycle(buf).unwrap();
//! assert_eq!(pool.used_bytes(), 0);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod util;

pub use config::Config;
pub use error::{PoolError, ReleaseError};
pub use pool::{Buffer, BufferPool, ChunkHandle, ProbeOrder};

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
