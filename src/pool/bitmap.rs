//! Chunk usage bitmap
//!
//! One bit per chunk packed into `u64` words (1 = in use, 0 = free).
//! Bits past `len` in the last word are always 0.

const WORD_BITS: usize = 64;

/// Usage bits for the chunks of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBitmap {
    words: Box<[u64]>,
    len: usize,
}

impl ChunkBitmap {
    /// Create an all-clear bitmap of `len` chunks
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(WORD_BITS)].into_boxed_slice(),
            len,
        }
    }

    /// Number of tracked chunks
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check whether chunk `index` is in use
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Count chunks in use
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Find the first run of `count` free chunks, scanning left to right.
    ///
    /// Stops at the first position where a run reaches `count`; a used chunk
    /// resets the candidate. Fully used and fully free words are stepped
    /// over whole.
    pub fn first_fit(&self, count: usize) -> Option<usize> {
        if count == 0 || count > self.len {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        let mut i = 0;

        while i < self.len {
            let word = self.words[i / WORD_BITS];

            if i % WORD_BITS == 0 {
                if word == u64::MAX {
                    run_len = 0;
                    i += WORD_BITS;
                    continue;
                }
                if word == 0 {
                    let span = WORD_BITS.min(self.len - i);
                    if run_len == 0 {
                        run_start = i;
                    }
                    if run_len + span >= count {
                        return Some(run_start);
                    }
                    run_len += span;
                    i += span;
                    continue;
                }
            }

            if word & (1u64 << (i % WORD_BITS)) != 0 {
                run_len = 0;
            } else {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            }
            i += 1;
        }

        None
    }

    /// Mark `[start, start + count)` as used
    pub fn set_run(&mut self, start: usize, count: usize) {
        debug_assert!(start + count <= self.len);
        for i in start..start + count {
            self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        }
    }

    /// Mark `[start, start + count)` as free
    pub fn clear_run(&mut self, start: usize, count: usize) {
        debug_assert!(start + count <= self.len);
        for i in start..start + count {
            self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
        }
    }

    /// First chunk in `[start, start + count)` that is free, if any
    pub fn first_clear_in(&self, start: usize, count: usize) -> Option<usize> {
        (start..start + count).find(|&i| !self.get(i))
    }

    /// Length of the longest free run
    pub fn largest_free_run(&self) -> usize {
        let mut best = 0;
        let mut current = 0;
        for i in 0..self.len {
            if self.get(i) {
                current = 0;
            } else {
                current += 1;
                best = best.max(current);
            }
        }
        best
    }
}
