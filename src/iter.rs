//! Composite iteration: generations in creation order, buckets in index
//! order, tree nodes in key order.
//!
//! `Position` is the detached cursor `(generation, bucket, node)`; the end
//! sentinel is the position past the last generation, never a dangling
//! handle. Stepping uses the presence bitmap to skip empty buckets and the
//! tree's parent links to find in-bucket successors.

use crate::bitmap::PresenceBitmap;
use crate::generation::Generation;
use crate::rb_tree::{self, NodeKey, RbTree};
use core::fmt;
use core::iter::FusedIterator;
use std::error::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Slot {
    pub(crate) generation: usize,
    pub(crate) bucket: usize,
    pub(crate) node: NodeKey,
}

/// A position in a `GenHashMap`: either an entry or the end sentinel.
///
/// Positions do not borrow the map. Two positions are equal iff both are the
/// end, or both name the same generation, bucket and tree node. Removing the
/// entry a position names makes it stale; using a stale position reports
/// `PositionError::Stale` and never resolves to another entry.
///
/// `rehash`, `reserve` (when it resizes) and `clear` rebuild the directory
/// and invalidate every position. A position kept across them may report
/// `Stale` or name an unrelated entry, but never touches freed memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(pub(crate) Option<Slot>);

impl Position {
    pub const END: Position = Position(None);

    pub fn is_end(&self) -> bool {
        self.0.is_none()
    }

    pub(crate) fn at(generation: usize, bucket: usize, node: NodeKey) -> Self {
        Position(Some(Slot {
            generation,
            bucket,
            node,
        }))
    }
}

/// Failure to use a `Position`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionError {
    /// The position is the end sentinel.
    End,
    /// The entry the position named has been removed.
    Stale,
    /// The end of a range is not reachable by advancing from its start.
    Reversed,
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::End => f.write_str("position is past the end of the map"),
            PositionError::Stale => f.write_str("position refers to a removed entry"),
            PositionError::Reversed => f.write_str("range end precedes range start"),
        }
    }
}

impl Error for PositionError {}

pub(crate) fn tree_at<K, V>(gens: &[Generation<K, V>], slot: Slot) -> Option<&RbTree<K, V>> {
    gens.get(slot.generation)
        .and_then(|g| g.buckets.get(slot.bucket))
}

/// First entry at or after `(generation, bucket)`.
pub(crate) fn first_from<K, V>(
    gens: &[Generation<K, V>],
    mut generation: usize,
    mut bucket: usize,
) -> Option<Slot> {
    while let Some(g) = gens.get(generation) {
        while let Some(b) = g.occupancy.next_set(bucket) {
            if let Some(node) = g.buckets[b].first() {
                return Some(Slot {
                    generation,
                    bucket: b,
                    node,
                });
            }
            bucket = b + 1;
        }
        generation += 1;
        bucket = 0;
    }
    None
}

/// Last entry strictly before bucket `bucket` of `generation`, searching
/// backwards through earlier generations.
pub(crate) fn last_before<K, V>(
    gens: &[Generation<K, V>],
    generation: usize,
    bucket: usize,
) -> Option<Slot> {
    let mut generation = generation.min(gens.len());
    let mut before = if generation == gens.len() { usize::MAX } else { bucket };
    loop {
        if let Some(g) = gens.get(generation) {
            while let Some(b) = g.occupancy.prev_set(before) {
                if let Some(node) = g.buckets[b].last() {
                    return Some(Slot {
                        generation,
                        bucket: b,
                        node,
                    });
                }
                before = b;
            }
        }
        if generation == 0 {
            return None;
        }
        generation -= 1;
        before = usize::MAX;
    }
}

/// Entry after `slot`, or `None` at the end.
pub(crate) fn next_slot<K, V>(gens: &[Generation<K, V>], slot: Slot) -> Option<Slot> {
    let tree = tree_at(gens, slot)?;
    match tree.next(slot.node) {
        Some(node) => Some(Slot { node, ..slot }),
        None => first_from(gens, slot.generation, slot.bucket + 1),
    }
}

/// Entry before `slot`, or `None` at the front.
pub(crate) fn prev_slot<K, V>(gens: &[Generation<K, V>], slot: Slot) -> Option<Slot> {
    let tree = tree_at(gens, slot)?;
    match tree.prev(slot.node) {
        Some(node) => Some(Slot { node, ..slot }),
        None => last_before(gens, slot.generation, slot.bucket),
    }
}

/// Shared iterator over `(&K, &V)`.
pub struct Iter<'a, K, V> {
    gens: &'a [Generation<K, V>],
    front: Option<Slot>,
    back: Option<Slot>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(gens: &'a [Generation<K, V>], len: usize) -> Self {
        Self {
            gens,
            front: first_from(gens, 0, 0),
            back: last_before(gens, gens.len(), 0),
            remaining: len,
        }
    }
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            gens: self.gens,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'a, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.front?;
        self.front = next_slot(self.gens, slot);
        self.remaining -= 1;
        tree_at(self.gens, slot)?.key_value(slot.node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.back?;
        self.back = prev_slot(self.gens, slot);
        self.remaining -= 1;
        tree_at(self.gens, slot)?.key_value(slot.node)
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Mutable iterator over `(&K, &mut V)`, in the same order as `Iter`.
pub struct IterMut<'a, K, V> {
    gens: core::slice::IterMut<'a, Generation<K, V>>,
    buckets: BucketsMut<'a, K, V>,
    current: Option<rb_tree::IterMut<'a, K, V>>,
    remaining: usize,
}

/// Unvisited buckets of one generation; `trees[0]` is bucket `base`.
struct BucketsMut<'a, K, V> {
    trees: &'a mut [RbTree<K, V>],
    occupancy: Option<&'a PresenceBitmap>,
    base: usize,
}

impl<'a, K, V> BucketsMut<'a, K, V> {
    fn next_occupied(&mut self) -> Option<&'a mut RbTree<K, V>> {
        let b = self.occupancy?.next_set(self.base)?;
        let trees = core::mem::take(&mut self.trees);
        let (tree, rest) = trees.get_mut(b - self.base..)?.split_first_mut()?;
        self.trees = rest;
        self.base = b + 1;
        Some(tree)
    }
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(gens: &'a mut [Generation<K, V>], len: usize) -> Self {
        Self {
            gens: gens.iter_mut(),
            buckets: BucketsMut {
                trees: &mut [],
                occupancy: None,
                base: 0,
            },
            current: None,
            remaining: len,
        }
    }
}

impl<'a, K: Ord, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(item);
            }
            if let Some(tree) = self.buckets.next_occupied() {
                self.current = Some(tree.iter_mut());
                continue;
            }
            let Generation {
                buckets, occupancy, ..
            } = self.gens.next()?;
            self.buckets = BucketsMut {
                trees: &mut buckets[..],
                occupancy: Some(occupancy),
                base: 0,
            };
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: Ord, V> ExactSizeIterator for IterMut<'a, K, V> {}
impl<'a, K: Ord, V> FusedIterator for IterMut<'a, K, V> {}

/// Owning iterator over `(K, V)`, in the same order as `Iter`.
pub struct IntoIter<K, V> {
    gens: std::vec::IntoIter<Generation<K, V>>,
    buckets: Option<BucketsOwned<K, V>>,
    current: Option<rb_tree::IntoIter<K, V>>,
    remaining: usize,
}

/// Unconsumed buckets of one generation; the next tree yielded is bucket
/// `base`.
struct BucketsOwned<K, V> {
    trees: std::vec::IntoIter<RbTree<K, V>>,
    occupancy: PresenceBitmap,
    base: usize,
}

impl<K, V> BucketsOwned<K, V> {
    fn next_occupied(&mut self) -> Option<RbTree<K, V>> {
        let b = self.occupancy.next_set(self.base)?;
        let tree = self.trees.nth(b - self.base)?;
        self.base = b + 1;
        Some(tree)
    }
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(gens: Vec<Generation<K, V>>, len: usize) -> Self {
        Self {
            gens: gens.into_iter(),
            buckets: None,
            current: None,
            remaining: len,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(item);
            }
            if let Some(tree) = self.buckets.as_mut().and_then(BucketsOwned::next_occupied) {
                self.current = Some(tree.into_iter());
                continue;
            }
            let Generation {
                buckets, occupancy, ..
            } = self.gens.next()?;
            self.buckets = Some(BucketsOwned {
                trees: buckets.into_vec().into_iter(),
                occupancy,
                base: 0,
            });
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Keys<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a K> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<'a, K, V> ExactSizeIterator for Keys<'a, K, V> {}

pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Values<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a V> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<'a, K, V> ExactSizeIterator for Values<'a, K, V> {}

pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K: Ord, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: Ord, V> ExactSizeIterator for ValuesMut<'a, K, V> {}
