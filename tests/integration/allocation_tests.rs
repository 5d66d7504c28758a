//! Single-threaded allocation behaviour

use pagepool::{BufferPool, PoolError, ProbeOrder};

/// Set bits per page must match the bytes held from that page
fn assert_bitmaps_match(pool: &BufferPool, held: &[&pagepool::Buffer]) {
    for page in pool.pages() {
        let bytes: usize = held
            .iter()
            .filter(|buf| buf.handle().region() == page.id())
            .map(|buf| buf.capacity())
            .sum();
        assert_eq!(page.bitmap().count_ones(), bytes / pool.chunk_size());
    }
}

/// 1024 B pages, 128 B chunks, 2 pages
#[test]
fn test_two_page_scenario() {
    let pool = BufferPool::new(1024, 128, 2).unwrap();
    assert_eq!(pool.chunks_per_page(), 8);

    let small = pool.allocate(300).unwrap();
    assert_eq!(small.capacity(), 384);
    assert_eq!(small.handle().chunk_count(), 3);

    // Only fits the page that is still untouched
    let full = pool.allocate(1024).unwrap();
    assert_eq!(full.capacity(), 1024);
    assert_ne!(full.handle().page_index(), small.handle().page_index());

    // Neither page has 8 free chunks any more
    assert!(pool.allocate(1024).is_none());
    assert_bitmaps_match(&pool, &[&small, &full]);

    pool.recycle(small).unwrap();
    pool.recycle(full).unwrap();
    for page in pool.pages() {
        assert_eq!(page.used_chunks(), 0);
    }
}

#[test]
fn test_any_size_up_to_a_page_fits_an_empty_pool() {
    let chunk_size = 64;
    for order in [ProbeOrder::Split, ProbeOrder::Wrapping] {
        let pool = BufferPool::with_probe_order(512, chunk_size, 3, order).unwrap();
        for size in 1..=512 {
            let buf = pool.allocate(size).unwrap();
            assert_eq!(buf.capacity(), size.div_ceil(chunk_size) * chunk_size);
            pool.recycle(buf).unwrap();
        }
        assert_eq!(pool.used_bytes(), 0);
    }
}

#[test]
fn test_round_trip_restores_exact_state() {
    let pool = BufferPool::new(1024, 128, 2).unwrap();
    let a = pool.allocate(128).unwrap();
    let b = pool.allocate(500).unwrap();
    let c = pool.allocate(129).unwrap();
    drop(b);

    let before: Vec<_> = pool.pages().iter().map(|p| p.bitmap()).collect();
    for size in [1, 128, 256, 300, 640] {
        if let Some(buf) = pool.allocate(size) {
            pool.recycle(buf).unwrap();
        }
        let after: Vec<_> = pool.pages().iter().map(|p| p.bitmap()).collect();
        assert_eq!(after, before, "size {size}");
    }

    assert_bitmaps_match(&pool, &[&a, &c]);
}

#[test]
fn test_fragmentation_across_pages_is_not_pooled() {
    let pool = BufferPool::new(512, 128, 2).unwrap();

    // Fill both pages, then free two non-adjacent chunks in each
    let mut bufs: Vec<_> = std::iter::from_fn(|| pool.allocate(128)).collect();
    assert_eq!(bufs.len(), 8);
    let mut freed = 0;
    bufs.retain(|buf| {
        let keep = buf.handle().start_chunk() % 2 == 1;
        if !keep {
            freed += 1;
        }
        keep
    });
    assert_eq!(freed, 4);

    // 512 free bytes in total, but no page has two adjacent free chunks
    assert_eq!(pool.capacity() - pool.used_bytes(), 512);
    assert!(pool.allocate(256).is_none());
    assert!(pool.allocate(128).is_some());
}

#[test]
fn test_recycle_into_wrong_pool_is_reported() {
    let a = BufferPool::new(1024, 128, 2).unwrap();
    let b = BufferPool::new(1024, 128, 2).unwrap();

    let buf = a.allocate(256).unwrap();
    let region = buf.handle().region();

    match b.recycle(buf) {
        Err(PoolError::ForeignBuffer { region: r, buffer }) => {
            assert_eq!(r, region);
            assert_eq!(b.used_bytes(), 0);
            a.recycle(buffer).unwrap();
        }
        other => panic!("expected ForeignBuffer, got {other:?}"),
    }

    assert_eq!(a.used_bytes(), 0);
    assert_eq!(b.stats().recycle_misses, 1);
}

#[test]
fn test_buffer_contents_are_independent() {
    let pool = BufferPool::new(1024, 64, 1).unwrap();
    let mut bufs: Vec<_> = (0..8u8)
        .map(|i| {
            let mut buf = pool.allocate(100).unwrap();
            buf.fill(i);
            buf
        })
        .collect();

    for (i, buf) in bufs.iter().enumerate() {
        assert!(buf.iter().all(|&b| b == i as u8));
    }

    bufs[3].fill(0xFF);
    assert!(bufs[2].iter().all(|&b| b == 2));
    assert!(bufs[4].iter().all(|&b| b == 4));

    for buf in bufs.drain(..) {
        pool.recycle(buf).unwrap();
    }
}
