//! Packed presence bitmap: one bit per bucket slot.
//!
//! Bits are stored in `u64` words; `next_set`/`prev_set` skip a whole empty
//! word per step, so walking past runs of empty buckets costs a word scan
//! rather than a per-slot check.

use core::fmt;
use std::error::Error;

const WORD_BITS: usize = 64;

/// Bitmap access past its length.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bitmap index {} out of range for length {}",
            self.index, self.len
        )
    }
}

impl Error for OutOfRange {}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PresenceBitmap {
    words: Box<[u64]>,
    len: usize,
}

impl PresenceBitmap {
    /// A bitmap of `len` cleared bits.
    pub fn new(len: usize) -> Self {
        let words = vec![0u64; len.div_ceil(WORD_BITS)].into_boxed_slice();
        Self { words, len }
    }

    /// Re-initialize to `len` cleared bits, dropping the old contents.
    pub fn init(&mut self, len: usize) {
        *self = Self::new(len);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check(&self, index: usize) -> Result<(usize, u64), OutOfRange> {
        if index >= self.len {
            return Err(OutOfRange {
                index,
                len: self.len,
            });
        }
        Ok((index / WORD_BITS, 1u64 << (index % WORD_BITS)))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Result<bool, OutOfRange> {
        let (word, mask) = self.check(index)?;
        Ok(self.words[word] & mask != 0)
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) -> Result<(), OutOfRange> {
        let (word, mask) = self.check(index)?;
        if value {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Smallest set index `>= from`.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let mut word_idx = from / WORD_BITS;
        // Mask off bits below `from` in the first word.
        let mut word = self.words[word_idx] & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                let index = word_idx * WORD_BITS + word.trailing_zeros() as usize;
                // Bits past `len` are never set, so no bound check is needed.
                return Some(index);
            }
            word_idx += 1;
            if word_idx == self.words.len() {
                return None;
            }
            word = self.words[word_idx];
        }
    }

    /// Largest set index `< before`.
    pub fn prev_set(&self, before: usize) -> Option<usize> {
        let end = before.min(self.len);
        if end == 0 {
            return None;
        }
        let last = end - 1;
        let mut word_idx = last / WORD_BITS;
        let shift = WORD_BITS - 1 - last % WORD_BITS;
        // Mask off bits above `last` in the first word.
        let mut word = self.words[word_idx] & (!0u64 >> shift);
        loop {
            if word != 0 {
                return Some(word_idx * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as usize));
            }
            if word_idx == 0 {
                return None;
            }
            word_idx -= 1;
            word = self.words[word_idx];
        }
    }

    /// Set indices in ascending order.
    pub fn iter_ones(&self) -> IterOnes<'_> {
        IterOnes {
            bitmap: self,
            next: 0,
        }
    }
}

pub struct IterOnes<'a> {
    bitmap: &'a PresenceBitmap,
    next: usize,
}

impl<'a> Iterator for IterOnes<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let found = self.bitmap.next_set(self.next)?;
        self.next = found + 1;
        Some(found)
    }
}
