//! Occupancy bitmap over the price ladder.
//!
//! One bit per tick, set iff that price level is non-empty. Best-price
//! recovery after a level drains scans whole words, skipping zeroes and
//! finishing with a count-leading/trailing-zeros on the first non-zero
//! word, so the cost is O(words scanned) with a tiny constant.

const WORD_BITS: usize = 64;

pub struct Bitmap {
    words: Vec<u64>,
    bits: usize,
}

impl Bitmap {
    pub fn new(bits: usize) -> Self {
        let words = vec![0u64; bits.div_ceil(WORD_BITS)];
        Self { words, bits }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[inline]
    pub fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.bits);
        self.words[idx / WORD_BITS] |= 1u64 << (idx % WORD_BITS);
    }

    #[inline]
    pub fn clear(&mut self, idx: usize) {
        debug_assert!(idx < self.bits);
        self.words[idx / WORD_BITS] &= !(1u64 << (idx % WORD_BITS));
    }

    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        debug_assert!(idx < self.bits);
        self.words[idx / WORD_BITS] & (1u64 << (idx % WORD_BITS)) != 0
    }

    /// Highest set bit at or below `idx`, or `None`.
    ///
    /// The first word is masked so bits above `idx` never leak in.
    pub fn find_highest_at_or_below(&self, idx: usize) -> Option<usize> {
        if self.bits == 0 {
            return None;
        }
        let idx = idx.min(self.bits - 1);
        let mut w = idx / WORD_BITS;
        let bit = idx % WORD_BITS;

        // Mask keeps [0, bit] of the first word.
        let mut word = self.words[w]
            & if bit == WORD_BITS - 1 {
                u64::MAX
            } else {
                (1u64 << (bit + 1)) - 1
            };

        loop {
            if word != 0 {
                let top = WORD_BITS - 1 - word.leading_zeros() as usize;
                return Some(w * WORD_BITS + top);
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            word = self.words[w];
        }
    }

    /// Lowest set bit at or above `idx`, or `None`.
    pub fn find_lowest_at_or_above(&self, idx: usize) -> Option<usize> {
        if idx >= self.bits {
            return None;
        }
        let mut w = idx / WORD_BITS;
        let bit = idx % WORD_BITS;

        // Mask keeps [bit, 63] of the first word.
        let mut word = self.words[w] & (u64::MAX << bit);

        loop {
            if word != 0 {
                let low = word.trailing_zeros() as usize;
                let found = w * WORD_BITS + low;
                return (found < self.bits).then_some(found);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            word = self.words[w];
        }
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }
}
