//! gen-hashmap: a single-threaded hash map whose buckets are red-black
//! trees and which grows by appending hash-directory generations instead of
//! rehashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bounded insert latency. Growth allocates one empty bucket array
//!   and never moves an existing entry; only an explicit `rehash`/`reserve`
//!   rebuilds.
//! - Layers:
//!   - `xxhash`: XXH32 digests (one-shot and as a `Hasher`) plus linear and
//!     modulo mapping of a 32-bit digest onto an inclusive range.
//!   - `bitmap::PresenceBitmap`: one bit per bucket, set iff the bucket is
//!     non-empty, with word-level scans for the next/previous set bit.
//!   - `rb_tree::RbTree<K, V>`: a key-ordered bucket. Nodes live in a
//!     `slotmap` arena and link to each other by `NodeKey`.
//!   - `Generation<K, V>`: a fixed bucket array with its bitmap.
//!   - `GenHashMap<K, V, S>`: the directory, an ordered list of
//!     generations that all share one bucket count.
//!   - `iter`: the composite walk over generations, buckets and trees, and
//!     the detached `Position` cursor.
//!
//! Constraints
//! - Single-threaded; no interior mutability and no `unsafe`.
//! - Keys are `Hash + Ord`: hashing picks the bucket, ordering places the
//!   key inside its bucket tree, so colliding keys cost `O(log n)` rather
//!   than a list scan.
//! - A key is stored at most once across all generations.
//!
//! Lookup and growth
//! - A key hashes to the same bucket index in every generation. Lookups
//!   check that index oldest to newest, skipping generations whose presence
//!   bit is clear without touching the tree.
//! - New keys go to the newest generation. When the share of non-empty
//!   buckets there exceeds 0.75, an empty generation of the same size is
//!   appended.
//! - `rehash` and a resizing `reserve` fold every generation into one of
//!   the requested size.
//!
//! Positions
//! - A `Position` names `(generation, bucket, node)` and does not borrow the
//!   map. Tree removal relinks nodes rather than moving payloads, so a
//!   position stays valid until its own entry is removed; afterwards the
//!   arena's versioned keys report it stale. Rebuilding operations
//!   (`rehash`, resizing `reserve`, `clear`) invalidate all positions.
//!
//! Notes and non-goals
//! - No concurrent access and no custom allocators.
//! - Iteration order is generation, then bucket, then key; it is stable
//!   between mutations but otherwise unspecified.
//! - Structural events (generation append, rehash, clear) are reported
//!   through `tracing` at debug/trace level; nothing is logged per lookup.

pub mod bitmap;
mod gen_hash_map;
mod gen_hash_map_proptest;
mod generation;
pub mod iter;
pub mod rb_tree;
mod rb_tree_proptest;
pub mod xxhash;

// Public surface
pub use bitmap::{OutOfRange, PresenceBitmap};
pub use gen_hash_map::{GenHashMap, KeyNotFound, MAX_BUCKETS, MAX_LOAD_FACTOR, MIN_BUCKETS};
pub use iter::{Position, PositionError};
pub use rb_tree::{NodeKey, RbTree};
pub use xxhash::{BuildXxHash32, RangeError, XxHash32};
