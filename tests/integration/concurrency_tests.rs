//! Multi-threaded allocation behaviour

use std::sync::{Arc, Barrier};
use std::thread;

use pagepool::{Buffer, BufferPool};

/// N threads, one N-chunk page: every single-chunk request succeeds
#[test]
fn test_threads_fill_single_page() {
    const THREADS: usize = 16;
    let pool = Arc::new(BufferPool::new(THREADS * 64, 64, 1).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // A busy page is skipped rather than waited on, so retry
                // until the lock is free; the page has room for everyone.
                loop {
                    if let Some(buf) = pool.allocate(64) {
                        return buf;
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    let bufs: Vec<Buffer> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(bufs.len(), THREADS);

    let page = &pool.pages()[0];
    assert_eq!(page.used_chunks(), THREADS);

    let mut starts: Vec<_> = bufs.iter().map(|b| b.handle().start_chunk()).collect();
    starts.sort_unstable();
    assert_eq!(starts, (0..THREADS).collect::<Vec<_>>());

    // Full until something comes back
    assert!(pool.allocate(64).is_none());
    let mut bufs = bufs;
    pool.recycle(bufs.pop().unwrap()).unwrap();
    assert!(pool.allocate(64).is_some());
}

/// Concurrent allocations on the same pool never hand out overlapping bytes
#[test]
fn test_no_overlap_under_contention() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 2_000;
    let pool = Arc::new(BufferPool::new(4096, 64, 4).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let stamp = t as u8 + 1;
                let mut held: Vec<Buffer> = Vec::new();
                let mut corrupted = 0;

                for round in 0..ROUNDS {
                    let size = 1 + (round * 37 + t * 101) % 700;
                    if let Some(mut buf) = pool.allocate(size) {
                        buf.fill(stamp);
                        held.push(buf);
                    }
                    if held.len() > 3 {
                        let buf = held.remove(0);
                        if buf.iter().any(|&b| b != stamp) {
                            corrupted += 1;
                        }
                        pool.recycle(buf).unwrap();
                    }
                }

                for buf in held {
                    if buf.iter().any(|&b| b != stamp) {
                        corrupted += 1;
                    }
                    pool.recycle(buf).unwrap();
                }
                corrupted
            })
        })
        .collect();

    let corrupted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(corrupted, 0);
    assert_eq!(pool.used_bytes(), 0);

    let stats = pool.stats();
    assert_eq!(stats.chunks_in_use, 0);
    assert_eq!(stats.outstanding(), 0);
}

/// Live runs across threads are pairwise disjoint at a quiescent point
#[test]
fn test_live_runs_are_disjoint() {
    const THREADS: usize = 6;
    let pool = Arc::new(BufferPool::new(2048, 128, 3).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..4)
                    .filter_map(|i| pool.allocate(128 * (1 + (t + i) % 3)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let bufs: Vec<Buffer> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    for (i, a) in bufs.iter().enumerate() {
        for b in &bufs[i + 1..] {
            let (ha, hb) = (a.handle(), b.handle());
            if ha.region() != hb.region() {
                continue;
            }
            let a_end = ha.start_chunk() + ha.chunk_count();
            let b_end = hb.start_chunk() + hb.chunk_count();
            assert!(
                a_end <= hb.start_chunk() || b_end <= ha.start_chunk(),
                "{ha:?} overlaps {hb:?}"
            );
        }
    }

    let held_chunks: usize = bufs.iter().map(|b| b.handle().chunk_count()).sum();
    let used_chunks: usize = pool.pages().iter().map(|p| p.used_chunks()).sum();
    assert_eq!(held_chunks, used_chunks);

    for buf in bufs {
        pool.recycle(buf).unwrap();
    }
    assert_eq!(pool.used_bytes(), 0);
}
