//! GenHashMap: generational hash directory with red-black tree buckets.
//!
//! Every generation has the same bucket count, so a key maps to the same
//! bucket index in each of them. Lookups check that index oldest to newest;
//! new keys always land in the newest generation. When the newest
//! generation's share of non-empty buckets exceeds `MAX_LOAD_FACTOR`, an
//! empty generation is appended instead of rehashing what is already stored.
//! Only `rehash`/`reserve` rebuild the directory, into a single generation.

use crate::generation::Generation;
use crate::iter::{
    first_from, last_before, next_slot, prev_slot, tree_at, IntoIter, Iter, IterMut, Keys,
    Position, PositionError, Slot, Values, ValuesMut,
};
use crate::rb_tree::NodeKey;
use crate::xxhash::{map_linear, BuildXxHash32};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::error::Error;

/// Growth threshold for the newest generation's non-empty-bucket ratio.
pub const MAX_LOAD_FACTOR: f64 = 0.75;
/// Smallest bucket count a directory is created with.
pub const MIN_BUCKETS: usize = 16;
/// Largest bucket count; indices must fit the 32-bit range mapping.
pub const MAX_BUCKETS: usize = 1 << 31;

/// Returned by `at`/`at_mut` when the key is absent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyNotFound;

impl fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl Error for KeyNotFound {}

/// Bucket count for an expected number of entries: the next power of two
/// above `estimated / 0.75`, at least `MIN_BUCKETS`.
fn buckets_for(estimated: usize) -> usize {
    if estimated == 0 {
        return MIN_BUCKETS;
    }
    // floor(n / 0.75) == floor(4n / 3), computed without going through f64.
    let required = (estimated / 3)
        .saturating_mul(4)
        .saturating_add(estimated % 3 * 4 / 3)
        .saturating_add(1);
    normalize_buckets(required)
}

fn normalize_buckets(n: usize) -> usize {
    n.max(MIN_BUCKETS)
        .checked_next_power_of_two()
        .unwrap_or(MAX_BUCKETS)
        .min(MAX_BUCKETS)
}

pub struct GenHashMap<K, V, S = BuildXxHash32> {
    hasher: S,
    generations: Vec<Generation<K, V>>,
    capacity: usize,
    len: usize,
}

impl<K, V> GenHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A map pre-sized for about `estimated` entries.
    pub fn with_capacity(estimated: usize) -> Self {
        Self::with_capacity_and_hasher(estimated, BuildXxHash32::default())
    }
}

impl<K, V, S: Default> Default for GenHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_capacity_and_hasher(0, S::default())
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for GenHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            generations: self.generations.clone(),
            capacity: self.capacity,
            len: self.len,
        }
    }
}

// Methods that need neither hashing nor ordering.
impl<K, V, S> GenHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(estimated: usize, hasher: S) -> Self {
        let capacity = buckets_for(estimated);
        Self {
            hasher,
            generations: vec![Generation::new(capacity)],
            capacity,
            len: 0,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shared bucket count of every generation.
    pub fn bucket_count(&self) -> usize {
        self.capacity
    }

    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    /// Non-empty-bucket ratio of the newest generation.
    pub fn load_factor(&self) -> f64 {
        self.newest().load_factor()
    }

    pub fn max_load_factor(&self) -> f64 {
        MAX_LOAD_FACTOR
    }

    pub fn max_size(&self) -> usize {
        usize::MAX
    }

    fn newest(&self) -> &Generation<K, V> {
        self.generations
            .last()
            .expect("directory always holds at least one generation")
    }

    /// Drop every entry and generation, keeping the bucket count.
    pub fn clear(&mut self) {
        tracing::debug!(
            len = self.len,
            generations = self.generations.len(),
            capacity = self.capacity,
            "clearing directory"
        );
        self.generations.clear();
        self.generations.push(Generation::new(self.capacity));
        self.len = 0;
    }

    /// Append an empty generation if the newest one is over the threshold.
    fn grow_if_needed(&mut self) {
        if self.newest().load_factor() <= MAX_LOAD_FACTOR {
            return;
        }
        // Build the generation before linking it in.
        let fresh = Generation::new(self.capacity);
        self.generations.push(fresh);
        tracing::trace!(
            capacity = self.capacity,
            generations = self.generations.len(),
            len = self.len,
            "appended generation"
        );
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.generations, self.len)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.generations, self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Position of the first entry, or `end()` if the map is empty.
    pub fn begin(&self) -> Position {
        Position(first_from(&self.generations, 0, 0))
    }

    pub fn end(&self) -> Position {
        Position::END
    }

    /// Position of the last entry, or `end()` if the map is empty.
    pub fn last(&self) -> Position {
        Position(last_before(&self.generations, self.generations.len(), 0))
    }

    fn live_slot(&self, pos: Position) -> Result<Slot, PositionError> {
        let slot = pos.0.ok_or(PositionError::End)?;
        match tree_at(&self.generations, slot) {
            Some(tree) if tree.contains_node(slot.node) => Ok(slot),
            _ => Err(PositionError::Stale),
        }
    }

    /// The position after `pos`; advancing the last entry yields `end()`.
    pub fn advance(&self, pos: Position) -> Result<Position, PositionError> {
        let slot = self.live_slot(pos)?;
        Ok(Position(next_slot(&self.generations, slot)))
    }

    /// The position before `pos`. Retreating from `end()` yields the last
    /// entry; retreating from the first entry is `PositionError::End`.
    pub fn retreat(&self, pos: Position) -> Result<Position, PositionError> {
        let found = match pos.0 {
            None => last_before(&self.generations, self.generations.len(), 0),
            Some(_) => prev_slot(&self.generations, self.live_slot(pos)?),
        };
        found.map(|s| Position(Some(s))).ok_or(PositionError::End)
    }

    /// The entry at `pos`. The end sentinel and stale positions are errors.
    pub fn get_at(&self, pos: Position) -> Result<(&K, &V), PositionError> {
        let slot = self.live_slot(pos)?;
        self.generations[slot.generation]
            .bucket(slot.bucket)
            .key_value(slot.node)
            .ok_or(PositionError::Stale)
    }

    pub fn get_at_mut(&mut self, pos: Position) -> Result<(&K, &mut V), PositionError> {
        let slot = self.live_slot(pos)?;
        self.generations[slot.generation]
            .bucket_mut(slot.bucket)
            .key_value_mut(slot.node)
            .ok_or(PositionError::Stale)
    }

    /// Remove the entry at `pos` and return it with the position that
    /// followed it. The follower is captured before anything is unlinked.
    pub fn remove_at(&mut self, pos: Position) -> Result<(K, V, Position), PositionError> {
        let slot = self.live_slot(pos)?;
        let next = Position(next_slot(&self.generations, slot));
        let (k, v) = self.generations[slot.generation]
            .remove_node(slot.bucket, slot.node)
            .ok_or(PositionError::Stale)?;
        self.len -= 1;
        Ok((k, v, next))
    }

    /// Remove every entry from `first` up to, not including, `last`.
    /// Returns `last`.
    ///
    /// Both bounds are checked and the span is walked before anything is
    /// removed: on error the map is unchanged. `PositionError::Reversed`
    /// means `last` is not reachable from `first`.
    pub fn remove_range(
        &mut self,
        first: Position,
        last: Position,
    ) -> Result<Position, PositionError> {
        let stop = match last.0 {
            Some(_) => Some(self.live_slot(last)?),
            None => None,
        };
        let mut cur = match first.0 {
            Some(_) => Some(self.live_slot(first)?),
            None => None,
        };
        let mut span = Vec::new();
        while cur != stop {
            let slot = cur.ok_or(PositionError::Reversed)?;
            span.push(slot);
            cur = next_slot(&self.generations, slot);
        }
        // Removal relinks rather than moves nodes, so the collected slots
        // stay valid while earlier ones are unlinked.
        for slot in span {
            self.generations[slot.generation]
                .remove_node(slot.bucket, slot.node)
                .expect("collected span holds live nodes");
            self.len -= 1;
        }
        Ok(last)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let removed: usize = self
            .generations
            .iter_mut()
            .map(|g| g.retain(&mut keep))
            .sum();
        self.len -= removed;
    }
}

impl<K, V, S> GenHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher,
{
    fn bucket_index<Q>(&self, q: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        self.bucket_index_for(q, self.capacity)
    }

    fn bucket_index_for<Q>(&self, q: &Q, capacity: usize) -> usize
    where
        Q: ?Sized + Hash,
    {
        // Truncating to 32 bits keeps XXH32's digest intact and takes the low
        // half of wider hashers.
        let hash = self.hasher.hash_one(q) as u32;
        let max = (capacity - 1) as u32;
        map_linear(hash, 0, max).expect("bucket range is never inverted") as usize
    }

    /// Scan generations oldest to newest for `q` at its bucket.
    fn locate<Q>(&self, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let bucket = self.bucket_index(q);
        self.locate_in(bucket, q)
    }

    fn locate_in<Q>(&self, bucket: usize, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.generations
            .iter()
            .enumerate()
            .find_map(|(generation, g)| {
                g.search(bucket, q).map(|node| Slot {
                    generation,
                    bucket,
                    node,
                })
            })
    }

    /// Put a key known to be absent into the newest generation.
    fn push_new(&mut self, bucket: usize, key: K, value: V) -> Position {
        let generation = self.generations.len() - 1;
        let node: NodeKey = self.generations[generation].insert_new(bucket, key, value);
        self.len += 1;
        self.grow_if_needed();
        Position::at(generation, bucket, node)
    }

    fn value_mut_at(&mut self, slot: Slot) -> &mut V {
        self.generations[slot.generation]
            .bucket_mut(slot.bucket)
            .key_value_mut(slot.node)
            .map(|(_, v)| v)
            .expect("located slot holds a live node")
    }

    /// Insert or overwrite. Returns the entry's position and whether a new
    /// entry was created; an existing key keeps its stored key and takes the
    /// new value in place.
    pub fn insert(&mut self, key: K, value: V) -> (Position, bool) {
        let bucket = self.bucket_index(&key);
        if let Some(slot) = self.locate_in(bucket, &key) {
            *self.value_mut_at(slot) = value;
            return (Position(Some(slot)), false);
        }
        (self.push_new(bucket, key, value), true)
    }

    /// Insert with a position hint. The hint is ignored.
    pub fn insert_hint(&mut self, _hint: Position, key: K, value: V) -> Position {
        self.insert(key, value).0
    }

    /// Insert a `(key, value)` pair.
    pub fn emplace(&mut self, (key, value): (K, V)) -> (Position, bool) {
        self.insert(key, value)
    }

    /// Insert `key` with a lazily built value if it is absent. Existing
    /// entries are left untouched and `make` is not called.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> (Position, bool)
    where
        F: FnOnce() -> V,
    {
        let bucket = self.bucket_index(&key);
        if let Some(slot) = self.locate_in(bucket, &key) {
            return (Position(Some(slot)), false);
        }
        (self.push_new(bucket, key, make()), true)
    }

    /// Insert and return the previous value, if any.
    pub fn replace(&mut self, key: K, value: V) -> Option<V> {
        let bucket = self.bucket_index(&key);
        if let Some(slot) = self.locate_in(bucket, &key) {
            return Some(core::mem::replace(self.value_mut_at(slot), value));
        }
        self.push_new(bucket, key, value);
        None
    }

    /// Insert every pair from `iter`.
    pub fn insert_many<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let (pos, _) = self.insert_with(key, make);
        let slot = pos.0.expect("insert always yields an entry position");
        self.value_mut_at(slot)
    }

    /// Value for `key`, inserting `V::default()` first if it is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Position of `q`, or `end()` if absent.
    pub fn find<Q>(&self, q: &Q) -> Position
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        Position(self.locate(q))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let slot = self.locate(q)?;
        self.generations[slot.generation]
            .bucket(slot.bucket)
            .key_value(slot.node)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let slot = self.locate(q)?;
        Some(self.value_mut_at(slot))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.locate(q).is_some()
    }

    /// Bounds-checked access: a missing key is an error, not a default.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.get(q).ok_or(KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.get_mut(q).ok_or(KeyNotFound)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let slot = self.locate(q)?;
        let removed = self.generations[slot.generation].remove_node(slot.bucket, slot.node)?;
        self.len -= 1;
        Some(removed)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Remove `q`, reporting whether anything was removed.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.remove_entry(q).is_some()
    }

    /// Rebuild into a single generation of at least `min_buckets` buckets.
    ///
    /// The bucket count is rounded up to a power of two and never shrinks.
    /// Calling this with a count at or below the current one still folds
    /// several generations into one.
    pub fn rehash(&mut self, min_buckets: usize) {
        let target = normalize_buckets(min_buckets).max(self.capacity);
        if target == self.capacity && self.generations.len() == 1 {
            return;
        }

        // Hash everything and allocate before the old generations are taken
        // apart, so a panicking `Hash` leaves the map as it was.
        let placement: Vec<usize> = self
            .keys()
            .map(|k| self.bucket_index_for(k, target))
            .collect();
        let mut fresh = Generation::new(target);
        let old_capacity = self.capacity;
        let old = core::mem::take(&mut self.generations);
        // `IntoIter` yields in the same order as `keys`.
        for ((k, v), bucket) in IntoIter::new(old, self.len).zip(placement) {
            fresh.insert_new(bucket, k, v);
        }
        self.capacity = target;
        self.generations.push(fresh);
        self.grow_if_needed();
        tracing::debug!(
            old_capacity,
            new_capacity = target,
            len = self.len,
            "rehashed into a single generation"
        );
    }

    /// Size the directory for `count` entries in total. Rebuilds only when
    /// that needs more buckets than the map already has.
    pub fn reserve(&mut self, count: usize) {
        let wanted = buckets_for(count);
        if wanted > self.capacity {
            self.rehash(wanted);
        }
    }
}

impl<K, V, S> fmt::Debug for GenHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for GenHashMap<K, V, S>
where
    K: Hash + Ord,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, S> Eq for GenHashMap<K, V, S>
where
    K: Hash + Ord,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for GenHashMap<K, V, S>
where
    K: Hash + Ord + Borrow<Q>,
    Q: ?Sized + Hash + Ord,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in GenHashMap")
    }
}

impl<K, V, S> Extend<(K, V)> for GenHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.insert_many(iter);
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for GenHashMap<K, V, S>
where
    K: Hash + Ord + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.insert_many(iter.into_iter().map(|(k, v)| (*k, *v)));
    }
}

impl<K, V, S> FromIterator<(K, V)> for GenHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        map.insert_many(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for GenHashMap<K, V>
where
    K: Hash + Ord,
{
    fn from(pairs: [(K, V); N]) -> Self {
        let mut map = Self::with_capacity(N);
        map.insert_many(pairs);
        map
    }
}

impl<K, V, S> IntoIterator for GenHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.generations, self.len)
    }
}

impl<'a, K, V, S> IntoIterator for &'a GenHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K: Ord, V, S> IntoIterator for &'a mut GenHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
impl<K: Ord, V, S> GenHashMap<K, V, S> {
    /// `(generation, bucket)` named by `pos`; `None` for the end sentinel.
    pub(crate) fn coordinates(pos: Position) -> Option<(usize, usize)> {
        pos.0.map(|slot| (slot.generation, slot.bucket))
    }

    /// Walk from `begin()` with `advance`, recording where each key sits.
    pub(crate) fn walk_coordinates(&self) -> Vec<(usize, usize, &K)> {
        let mut out = Vec::with_capacity(self.len);
        let mut pos = self.begin();
        while let Some((generation, bucket)) = Self::coordinates(pos) {
            let (k, _) = self.get_at(pos).expect("walk visits live entries");
            out.push((generation, bucket, k));
            pos = self.advance(pos).expect("walk visits live entries");
        }
        out
    }

    /// Check I2 (count), I3 (bitmap) and I4 (tree shape) across the whole
    /// directory.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.generations.is_empty() {
            return Err("no generations".into());
        }
        let mut total = 0;
        for (gi, g) in self.generations.iter().enumerate() {
            if g.capacity() != self.capacity {
                return Err(format!("generation {gi} has capacity {}", g.capacity()));
            }
            let mut occupied = 0;
            for (bi, tree) in g.buckets.iter().enumerate() {
                tree.check_invariants()
                    .map_err(|e| format!("generation {gi} bucket {bi}: {e}"))?;
                let bit = g.occupancy.get(bi).map_err(|e| e.to_string())?;
                if bit == tree.is_empty() {
                    return Err(format!(
                        "generation {gi} bucket {bi}: bit {bit} but {} entries",
                        tree.len()
                    ));
                }
                occupied += usize::from(bit);
                total += tree.len();
            }
            if occupied != g.occupied {
                return Err(format!(
                    "generation {gi}: counter {} but {occupied} occupied buckets",
                    g.occupied
                ));
            }
        }
        if total != self.len {
            return Err(format!("len {} but {total} stored entries", self.len));
        }
        Ok(())
    }
}
