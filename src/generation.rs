//! Generation: one fixed-size bucket array plus its presence bitmap.
//!
//! A generation is never resized. Bucket `i` is non-empty iff bit `i` of
//! `occupancy` is set, and `occupied` counts the set bits.

use crate::bitmap::PresenceBitmap;
use crate::rb_tree::{NodeKey, RbTree};
use core::borrow::Borrow;

#[derive(Clone, Debug)]
pub(crate) struct Generation<K, V> {
    pub(crate) buckets: Box<[RbTree<K, V>]>,
    pub(crate) occupancy: PresenceBitmap,
    pub(crate) occupied: usize,
}

impl<K, V> Generation<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let buckets: Box<[RbTree<K, V>]> = (0..capacity).map(|_| RbTree::new()).collect();
        Self {
            buckets,
            occupancy: PresenceBitmap::new(capacity),
            occupied: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Ratio of non-empty buckets to buckets.
    pub(crate) fn load_factor(&self) -> f64 {
        if self.buckets.is_empty() {
            return 0.0;
        }
        self.occupied as f64 / self.buckets.len() as f64
    }

    #[inline]
    pub(crate) fn is_occupied(&self, bucket: usize) -> bool {
        self.occupancy.get(bucket).unwrap_or(false)
    }

    pub(crate) fn bucket(&self, bucket: usize) -> &RbTree<K, V> {
        &self.buckets[bucket]
    }

    pub(crate) fn bucket_mut(&mut self, bucket: usize) -> &mut RbTree<K, V> {
        &mut self.buckets[bucket]
    }

    fn mark(&mut self, bucket: usize, occupied: bool) {
        self.occupancy
            .set(bucket, occupied)
            .expect("bucket index lies within its generation");
        if occupied {
            self.occupied += 1;
        } else {
            self.occupied -= 1;
        }
    }

    /// Remove the node `node` from `bucket`, clearing the bit when the
    /// bucket empties.
    pub(crate) fn remove_node(&mut self, bucket: usize, node: NodeKey) -> Option<(K, V)> {
        let removed = self.buckets[bucket].remove_node(node)?;
        if self.buckets[bucket].is_empty() {
            self.mark(bucket, false);
        }
        Some(removed)
    }

    /// Drop entries for which `keep` returns false. Returns how many went.
    pub(crate) fn retain<F>(&mut self, keep: &mut F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = 0;
        let mut bucket = 0;
        while let Some(b) = self.occupancy.next_set(bucket) {
            let tree = &mut self.buckets[b];
            let mut cur = tree.first();
            while let Some(node) = cur {
                cur = tree.next(node);
                let Some((k, v)) = tree.key_value_mut(node) else { break };
                if !keep(k, v) {
                    tree.remove_node(node);
                    removed += 1;
                }
            }
            if tree.is_empty() {
                self.mark(b, false);
            }
            bucket = b + 1;
        }
        removed
    }
}

impl<K: Ord, V> Generation<K, V> {
    pub(crate) fn search<Q>(&self, bucket: usize, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        if !self.is_occupied(bucket) {
            return None;
        }
        self.buckets[bucket].search(q)
    }

    /// Add a key known to be absent from the whole directory.
    pub(crate) fn insert_new(&mut self, bucket: usize, key: K, value: V) -> NodeKey {
        let was_empty = self.buckets[bucket].is_empty();
        let (node, replaced) = self.buckets[bucket].insert(key, value);
        debug_assert!(replaced.is_none(), "insert_new called with a present key");
        if was_empty {
            self.mark(bucket, true);
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_tracks_bucket_contents() {
        let mut g: Generation<u32, &str> = Generation::new(16);
        assert_eq!(g.capacity(), 16);
        let a = g.insert_new(3, 1, "a");
        g.insert_new(3, 2, "b");
        g.insert_new(9, 7, "c");
        assert_eq!(g.occupied, 2);
        assert!(g.is_occupied(3) && g.is_occupied(9));
        assert_eq!(g.load_factor(), 2.0 / 16.0);

        assert_eq!(g.remove_node(3, a), Some((1, "a")));
        assert!(g.is_occupied(3), "bucket still holds key 2");
        let b = g.search(3, &2).unwrap();
        g.remove_node(3, b);
        assert!(!g.is_occupied(3));
        assert_eq!(g.occupied, 1);
        assert_eq!(g.search(3, &2), None);
        assert_eq!(g.remove_node(3, b), None, "stale node is a no-op");
    }

    #[test]
    fn retain_clears_emptied_buckets() {
        let mut g: Generation<u32, u32> = Generation::new(8);
        for k in 0..6 {
            g.insert_new((k % 3) as usize, k, k * 10);
        }
        let removed = g.retain(&mut |k, v| {
            *v += 1;
            k % 3 != 1
        });
        assert_eq!(removed, 2);
        assert!(!g.is_occupied(1));
        assert_eq!(g.occupied, 2);
        assert_eq!(g.bucket(0).get(&3), Some(&31));
    }
}
