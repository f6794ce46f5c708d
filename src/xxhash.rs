//! XXH32: a seedless-by-default 32-bit hash with range mapping.
//!
//! The digest itself comes from `xxhash-rust`. `XxHash32` adapts its
//! streaming state to `Hasher`, so any `K: Hash` is hashed as the byte
//! stream its `Hash` impl writes. The one-shot helpers (`xxh32`, `hash_raw`,
//! `hash_linear`, `hash_modulo`) hash a byte span directly.
//!
//! Two ways to map a digest into `[min, max]`:
//! - linear scaling, `((hash * range) >> 32) + min`: near-uniform, used for
//!   bucket indexing;
//! - modulo, `(hash % range) + min`: cheaper, slightly biased toward low values.
//!
//! `min > max` is rejected with `RangeError`, never clamped.

use core::fmt;
use core::hash::{BuildHasher, Hasher};
use std::error::Error;
use xxhash_rust::xxh32::Xxh32;

/// Invalid range passed to a range-mapping function.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RangeError {
    pub min: u32,
    pub max: u32,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid hash range: min ({}) must be less than or equal to max ({})",
            self.min, self.max
        )
    }
}

impl Error for RangeError {}

/// Streaming XXH32 state.
#[derive(Clone)]
pub struct XxHash32 {
    seed: u32,
    state: Xxh32,
}

impl XxHash32 {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            state: Xxh32::new(seed),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Feed more bytes into the hash.
    #[inline]
    pub fn update(&mut self, input: &[u8]) {
        self.state.update(input);
    }

    /// Final 32-bit digest of everything fed so far. Does not reset the state.
    #[inline]
    pub fn digest(&self) -> u32 {
        self.state.digest()
    }
}

impl fmt::Debug for XxHash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XxHash32")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl Default for XxHash32 {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Hasher for XxHash32 {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }

    // Fixed-width integers are fed little-endian so digests do not depend on
    // the host byte order.
    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.update(&i.to_le_bytes());
    }
    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.update(&i.to_le_bytes());
    }
    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.update(&i.to_le_bytes());
    }
    #[inline]
    fn write_u128(&mut self, i: u128) {
        self.update(&i.to_le_bytes());
    }
    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.digest())
    }
}

/// `BuildHasher` producing `XxHash32` states with a fixed seed (0 by default).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BuildXxHash32 {
    seed: u32,
}

impl BuildXxHash32 {
    pub const fn with_seed(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl BuildHasher for BuildXxHash32 {
    type Hasher = XxHash32;

    fn build_hasher(&self) -> XxHash32 {
        XxHash32::with_seed(self.seed)
    }
}

/// One-shot XXH32 of `input`.
pub fn xxh32(input: &[u8], seed: u32) -> u32 {
    xxhash_rust::xxh32::xxh32(input, seed)
}

/// Seedless digest of `input` without range mapping.
pub fn hash_raw(input: &[u8]) -> u32 {
    xxh32(input, 0)
}

/// Map a digest into `[min, max]` by linear scaling.
pub fn map_linear(hash: u32, min: u32, max: u32) -> Result<u32, RangeError> {
    if min > max {
        return Err(RangeError { min, max });
    }
    let range = u64::from(max - min) + 1;
    // (hash * range) >> 32 < range, so the sum stays within [min, max].
    Ok(((u64::from(hash) * range) >> 32) as u32 + min)
}

/// Map a digest into `[min, max]` by modulo reduction.
pub fn map_modulo(hash: u32, min: u32, max: u32) -> Result<u32, RangeError> {
    if min > max {
        return Err(RangeError { min, max });
    }
    let range = u64::from(max - min) + 1;
    Ok((u64::from(hash) % range) as u32 + min)
}

/// Seedless hash of `input` mapped into `[min, max]` by linear scaling.
pub fn hash_linear(input: &[u8], min: u32, max: u32) -> Result<u32, RangeError> {
    map_linear(hash_raw(input), min, max)
}

/// Seedless hash of `input` mapped into `[min, max]` by modulo reduction.
pub fn hash_modulo(input: &[u8], min: u32, max: u32) -> Result<u32, RangeError> {
    map_modulo(hash_raw(input), min, max)
}
