//! RbTree: key-ordered bucket backed by a red-black tree.
//!
//! Nodes live in a `SlotMap` arena owned by the tree; links between nodes are
//! `NodeKey` handles rather than pointers. In-order successor and predecessor
//! are found structurally through parent/child links, so a `NodeKey` is a
//! complete cursor into the tree: no stack, no copy of the contents.
//!
//! Removal relinks nodes instead of swapping payloads between them. A
//! `NodeKey` therefore keeps naming the same entry until that entry itself is
//! removed, and a removed key never resolves again (slotmap keys are
//! generational), even if its slot is reused.
//!
//! Balance invariants, checked by the property tests:
//! - the root is black;
//! - a red node has no red child;
//! - every root-to-leaf path crosses the same number of black nodes;
//! - keys are strictly increasing in order; parent links mirror child links.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::collections::VecDeque;

new_key_type! {
    /// Handle to a node inside one `RbTree`.
    pub struct NodeKey;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) color: Color,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
}

#[derive(Clone)]
pub struct RbTree<K, V> {
    pub(crate) nodes: SlotMap<NodeKey, Node<K, V>>,
    pub(crate) root: Option<NodeKey>,
}

impl<K, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RbTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> RbTree<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    // Link accessors. A missing key here means the tree's own links are
    // corrupt, which is a bug in this module rather than a caller error.
    #[inline]
    fn node(&self, k: NodeKey) -> &Node<K, V> {
        &self.nodes[k]
    }
    #[inline]
    fn node_mut(&mut self, k: NodeKey) -> &mut Node<K, V> {
        &mut self.nodes[k]
    }
    #[inline]
    fn parent(&self, k: NodeKey) -> Option<NodeKey> {
        self.node(k).parent
    }
    #[inline]
    fn left(&self, k: NodeKey) -> Option<NodeKey> {
        self.node(k).left
    }
    #[inline]
    fn right(&self, k: NodeKey) -> Option<NodeKey> {
        self.node(k).right
    }
    /// Absent children count as black leaves.
    #[inline]
    fn is_red(&self, k: Option<NodeKey>) -> bool {
        k.map(|k| self.node(k).color == Color::Red).unwrap_or(false)
    }
    #[inline]
    fn set_color(&mut self, k: NodeKey, color: Color) {
        self.node_mut(k).color = color;
    }

    fn minimum(&self, mut k: NodeKey) -> NodeKey {
        while let Some(l) = self.left(k) {
            k = l;
        }
        k
    }

    fn maximum(&self, mut k: NodeKey) -> NodeKey {
        while let Some(r) = self.right(k) {
            k = r;
        }
        k
    }

    /// Node holding the smallest key.
    pub fn first(&self) -> Option<NodeKey> {
        self.root.map(|r| self.minimum(r))
    }

    /// Node holding the largest key.
    pub fn last(&self) -> Option<NodeKey> {
        self.root.map(|r| self.maximum(r))
    }

    /// In-order successor of `k`, or `None` if `k` is the last node or stale.
    pub fn next(&self, k: NodeKey) -> Option<NodeKey> {
        let node = self.nodes.get(k)?;
        if let Some(r) = node.right {
            return Some(self.minimum(r));
        }
        let mut child = k;
        let mut up = node.parent;
        while let Some(p) = up {
            if self.left(p) == Some(child) {
                return Some(p);
            }
            child = p;
            up = self.parent(p);
        }
        None
    }

    /// In-order predecessor of `k`, or `None` if `k` is the first node or stale.
    pub fn prev(&self, k: NodeKey) -> Option<NodeKey> {
        let node = self.nodes.get(k)?;
        if let Some(l) = node.left {
            return Some(self.maximum(l));
        }
        let mut child = k;
        let mut up = node.parent;
        while let Some(p) = up {
            if self.right(p) == Some(child) {
                return Some(p);
            }
            child = p;
            up = self.parent(p);
        }
        None
    }

    /// Node handles in key order.
    pub(crate) fn in_order(&self) -> Vec<NodeKey> {
        let mut order = Vec::with_capacity(self.len());
        let mut cur = self.first();
        while let Some(k) = cur {
            order.push(k);
            cur = self.next(k);
        }
        order
    }

    pub fn contains_node(&self, k: NodeKey) -> bool {
        self.nodes.contains_key(k)
    }

    pub fn key_value(&self, k: NodeKey) -> Option<(&K, &V)> {
        self.nodes.get(k).map(|n| (&n.key, &n.value))
    }

    pub fn key_value_mut(&mut self, k: NodeKey) -> Option<(&K, &mut V)> {
        self.nodes.get_mut(k).map(|n| (&n.key, &mut n.value))
    }

    fn rotate_left(&mut self, x: NodeKey) {
        let y = self.right(x).expect("rotate_left requires a right child");
        let y_left = self.left(y);
        self.node_mut(x).right = y_left;
        if let Some(b) = y_left {
            self.node_mut(b).parent = Some(x);
        }
        self.replace_child(x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    fn rotate_right(&mut self, x: NodeKey) {
        let y = self.left(x).expect("rotate_right requires a left child");
        let y_right = self.right(y);
        self.node_mut(x).left = y_right;
        if let Some(b) = y_right {
            self.node_mut(b).parent = Some(x);
        }
        self.replace_child(x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    /// Put `v` where `u` hangs from its parent (or at the root). `u`'s own
    /// links are left untouched.
    fn replace_child(&mut self, u: NodeKey, v: Option<NodeKey>) {
        let up = self.parent(u);
        match up {
            None => self.root = v,
            Some(p) => {
                if self.left(p) == Some(u) {
                    self.node_mut(p).left = v;
                } else {
                    self.node_mut(p).right = v;
                }
            }
        }
        if let Some(v) = v {
            self.node_mut(v).parent = up;
        }
    }

    fn insert_fixup(&mut self, mut z: NodeKey) {
        while let Some(p) = self.parent(z) {
            if !self.is_red(Some(p)) {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let g = self.parent(p).expect("red node has a parent");
            if self.left(g) == Some(p) {
                let uncle = self.right(g);
                if self.is_red(uncle) {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle.expect("red uncle exists"), Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                    continue;
                }
                if self.right(p) == Some(z) {
                    z = p;
                    self.rotate_left(z);
                }
                let p = self.parent(z).expect("rotated node has a parent");
                let g = self.parent(p).expect("rotated parent has a parent");
                self.set_color(p, Color::Black);
                self.set_color(g, Color::Red);
                self.rotate_right(g);
            } else {
                let uncle = self.left(g);
                if self.is_red(uncle) {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle.expect("red uncle exists"), Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                    continue;
                }
                if self.left(p) == Some(z) {
                    z = p;
                    self.rotate_right(z);
                }
                let p = self.parent(z).expect("rotated node has a parent");
                let g = self.parent(p).expect("rotated parent has a parent");
                self.set_color(p, Color::Black);
                self.set_color(g, Color::Red);
                self.rotate_left(g);
            }
        }
        if let Some(r) = self.root {
            self.set_color(r, Color::Black);
        }
    }

    /// Unlink node `z` and return its payload, rebalancing as needed.
    fn unlink(&mut self, z: NodeKey) -> (K, V) {
        let z_left = self.left(z);
        let z_right = self.right(z);
        let mut removed_color = self.node(z).color;
        let x;
        let x_parent;

        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = self.parent(z);
                self.replace_child(z, z_right);
            }
            (Some(_), None) => {
                x = z_left;
                x_parent = self.parent(z);
                self.replace_child(z, z_left);
            }
            (Some(zl), Some(zr)) => {
                // Splice in the successor node itself, keeping every other
                // node's key stable.
                let y = self.minimum(zr);
                removed_color = self.node(y).color;
                x = self.right(y);
                if self.parent(y) == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.parent(y);
                    self.replace_child(y, x);
                    self.node_mut(y).right = Some(zr);
                    self.node_mut(zr).parent = Some(y);
                }
                self.replace_child(z, Some(y));
                self.node_mut(y).left = Some(zl);
                self.node_mut(zl).parent = Some(y);
                let z_color = self.node(z).color;
                self.set_color(y, z_color);
            }
        }

        let node = self
            .nodes
            .remove(z)
            .expect("node must exist while it is being unlinked");
        if removed_color == Color::Black {
            self.remove_fixup(x, x_parent);
        }
        (node.key, node.value)
    }

    fn remove_fixup(&mut self, mut x: Option<NodeKey>, mut parent: Option<NodeKey>) {
        while x != self.root && !self.is_red(x) {
            let Some(p) = parent else { break };
            if self.left(p) == x {
                let mut w = self.right(p).expect("black-height deficit implies a sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p);
                    w = self.right(p).expect("sibling after rotation");
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.parent(p);
                } else {
                    if !self.is_red(self.right(w)) {
                        if let Some(wl) = self.left(w) {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.right(p).expect("sibling after rotation");
                    }
                    let p_color = self.node(p).color;
                    self.set_color(w, p_color);
                    self.set_color(p, Color::Black);
                    if let Some(wr) = self.right(w) {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = self.left(p).expect("black-height deficit implies a sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p);
                    w = self.left(p).expect("sibling after rotation");
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.parent(p);
                } else {
                    if !self.is_red(self.left(w)) {
                        if let Some(wr) = self.right(w) {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(p).expect("sibling after rotation");
                    }
                    let p_color = self.node(p).color;
                    self.set_color(w, p_color);
                    self.set_color(p, Color::Black);
                    if let Some(wl) = self.left(w) {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(x) = x {
            self.set_color(x, Color::Black);
        }
    }

    /// Remove the node named by `k`. Returns `None` if `k` is stale.
    pub fn remove_node(&mut self, k: NodeKey) -> Option<(K, V)> {
        if !self.nodes.contains_key(k) {
            return None;
        }
        Some(self.unlink(k))
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            front: self.first(),
            back: self.last(),
            remaining: self.len(),
        }
    }

    /// Breadth-first walk from the root.
    pub fn level_order(&self) -> LevelOrder<'_, K, V> {
        let mut queue = VecDeque::new();
        queue.extend(self.root);
        LevelOrder { tree: self, queue }
    }
}

impl<K: Ord, V> RbTree<K, V> {
    /// Node holding `q`, if any.
    pub fn search<Q>(&self, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut cur = self.root;
        while let Some(k) = cur {
            let node = self.node(k);
            cur = match q.cmp(node.key.borrow()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(k),
            };
        }
        None
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(q).map(|k| &self.node(k).value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let k = self.search(q)?;
        Some(&mut self.node_mut(k).value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(q).and_then(|k| self.key_value(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(q).is_some()
    }

    /// Insert `key -> value`. If the key is already present its value is
    /// replaced in place and the old value returned; the stored key is kept.
    pub fn insert(&mut self, key: K, value: V) -> (NodeKey, Option<V>) {
        let mut parent = None;
        let mut go_left = false;
        let mut cur = self.root;
        while let Some(k) = cur {
            let node = self.node(k);
            match key.cmp(&node.key) {
                Ordering::Less => {
                    parent = Some(k);
                    go_left = true;
                    cur = node.left;
                }
                Ordering::Greater => {
                    parent = Some(k);
                    go_left = false;
                    cur = node.right;
                }
                Ordering::Equal => {
                    let old = core::mem::replace(&mut self.node_mut(k).value, value);
                    return (k, Some(old));
                }
            }
        }

        let z = self.nodes.insert(Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        });
        match parent {
            None => self.root = Some(z),
            Some(p) if go_left => self.node_mut(p).left = Some(z),
            Some(p) => self.node_mut(p).right = Some(z),
        }
        self.insert_fixup(z);
        (z, None)
    }

    /// Remove `q`, returning the stored pair. Missing keys are a no-op.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let k = self.search(q)?;
        Some(self.unlink(k))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Mutable in-order iteration.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        // The arena hands out each `&mut` once, in slot order; a rank table
        // from the in-order walk puts every borrow in its key-order place.
        let order = self.in_order();
        let mut rank: SecondaryMap<NodeKey, usize> = SecondaryMap::with_capacity(order.len());
        for (i, &k) in order.iter().enumerate() {
            rank.insert(k, i);
        }
        let mut placed: Vec<Option<(&K, &mut V)>> = (0..order.len()).map(|_| None).collect();
        for (k, node) in self.nodes.iter_mut() {
            let Node { key, value, .. } = node;
            if let Some(&i) = rank.get(k) {
                placed[i] = Some((&*key, value));
            }
        }
        let entries: Vec<(&K, &mut V)> = placed.into_iter().flatten().collect();
        IterMut {
            inner: entries.into_iter(),
        }
    }
}

/// Shared in-order iterator, walking parent/child links.
pub struct Iter<'a, K, V> {
    tree: &'a RbTree<K, V>,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    remaining: usize,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let k = self.front?;
        self.front = self.tree.next(k);
        self.remaining -= 1;
        self.tree.key_value(k)
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
        let k = self.back?;
        self.back = self.tree.prev(k);
        self.remaining -= 1;
        self.tree.key_value(k)
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> core::iter::FusedIterator for Iter<'a, K, V> {}

pub struct IterMut<'a, K, V> {
    inner: std::vec::IntoIter<(&'a K, &'a mut V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}

/// Consuming in-order iterator.
pub struct IntoIter<K, V> {
    nodes: SlotMap<NodeKey, Node<K, V>>,
    order: std::vec::IntoIter<NodeKey>,
}

impl<K, V> IntoIterator for RbTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        // Record the order first: links are meaningless once nodes start
        // leaving the arena.
        let order = self.in_order();
        IntoIter {
            nodes: self.nodes,
            order: order.into_iter(),
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let k = self.order.next()?;
        self.nodes.remove(k).map(|n| (n.key, n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<(K, V)> {
        let k = self.order.next_back()?;
        self.nodes.remove(k).map(|n| (n.key, n.value))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<'a, K, V> IntoIterator for &'a RbTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Breadth-first iterator; yields each node once, root first.
pub struct LevelOrder<'a, K, V> {
    tree: &'a RbTree<K, V>,
    queue: VecDeque<NodeKey>,
}

impl<'a, K, V> Iterator for LevelOrder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.queue.pop_front()?;
        let node = self.tree.node(k);
        self.queue.extend(node.left);
        self.queue.extend(node.right);
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
impl<K: Ord, V> RbTree<K, V> {
    /// Validate every red-black and link invariant; returns the black height.
    pub(crate) fn check_invariants(&self) -> Result<usize, String> {
        let Some(root) = self.root else {
            return if self.nodes.is_empty() {
                Ok(0)
            } else {
                Err(format!("no root but {} nodes", self.nodes.len()))
            };
        };
        if self.node(root).parent.is_some() {
            return Err("root has a parent".into());
        }
        if self.node(root).color != Color::Black {
            return Err("root is red".into());
        }
        let mut seen = 0usize;
        let height = self.check_subtree(root, None, None, &mut seen)?;
        if seen != self.nodes.len() {
            return Err(format!(
                "{} nodes reachable, {} in arena",
                seen,
                self.nodes.len()
            ));
        }
        Ok(height)
    }

    fn check_subtree(
        &self,
        k: NodeKey,
        lo: Option<&K>,
        hi: Option<&K>,
        seen: &mut usize,
    ) -> Result<usize, String> {
        let node = self
            .nodes
            .get(k)
            .ok_or_else(|| "dangling child link".to_string())?;
        *seen += 1;
        if lo.is_some_and(|lo| node.key <= *lo) || hi.is_some_and(|hi| node.key >= *hi) {
            return Err("key out of order".into());
        }
        let mut heights = [0usize; 2];
        for (i, child) in [node.left, node.right].into_iter().enumerate() {
            if let Some(c) = child {
                if self.nodes.get(c).map(|n| n.parent) != Some(Some(k)) {
                    return Err("child's parent link does not point back".into());
                }
                if node.color == Color::Red && self.node(c).color == Color::Red {
                    return Err("red node with red child".into());
                }
                heights[i] = if i == 0 {
                    self.check_subtree(c, lo, Some(&node.key), seen)?
                } else {
                    self.check_subtree(c, Some(&node.key), hi, seen)?
                };
            }
        }
        if heights[0] != heights[1] {
            return Err(format!(
                "black height mismatch: {} vs {}",
                heights[0], heights[1]
            ));
        }
        Ok(heights[0] + usize::from(node.color == Color::Black))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(keys: &[i32]) -> RbTree<i32, String> {
        let mut t = RbTree::new();
        for &k in keys {
            t.insert(k, k.to_string());
        }
        t
    }

    /// Invariant: ascending inserts (the classic degenerate case for an
    /// unbalanced tree) keep the tree balanced and in order.
    #[test]
    fn ascending_inserts_stay_balanced() {
        let keys: Vec<i32> = (0..1000).collect();
        let t = tree_of(&keys);
        let bh = t.check_invariants().unwrap();
        // 2 * black height bounds the height; log2(1000) ~ 10.
        assert!(bh <= 11, "black height {bh}");
        assert_eq!(t.len(), 1000);
        assert!(t.iter().map(|(k, _)| *k).eq(0..1000));
    }

    /// Invariant: a duplicate insert replaces the value and keeps one node.
    #[test]
    fn duplicate_insert_replaces_value() {
        let mut t = tree_of(&[5, 3, 8]);
        let (k1, old) = t.insert(3, "three".to_string());
        assert_eq!(old.as_deref(), Some("3"));
        assert_eq!(t.len(), 3);
        assert_eq!(t.search(&3), Some(k1));
        assert_eq!(t.get(&3).map(String::as_str), Some("three"));
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut t = tree_of(&[1, 2, 3]);
        assert_eq!(t.remove(&4), None);
        assert_eq!(t.len(), 3);
        let mut empty: RbTree<i32, i32> = RbTree::new();
        assert_eq!(empty.remove(&1), None);
        assert!(empty.first().is_none());
    }

    /// Invariant: successor/predecessor walks agree with sorted order in both
    /// directions, and run off the ends to `None`.
    #[test]
    fn structural_successor_and_predecessor() {
        let t = tree_of(&[50, 20, 80, 10, 30, 70, 90, 25, 35, 75]);
        let mut fwd = Vec::new();
        let mut cur = t.first();
        while let Some(k) = cur {
            fwd.push(*t.key_value(k).unwrap().0);
            cur = t.next(k);
        }
        assert_eq!(fwd, vec![10, 20, 25, 30, 35, 50, 70, 75, 80, 90]);

        let mut back = Vec::new();
        let mut cur = t.last();
        while let Some(k) = cur {
            back.push(*t.key_value(k).unwrap().0);
            cur = t.prev(k);
        }
        fwd.reverse();
        assert_eq!(back, fwd);
    }

    /// Invariant: removing a node with two children leaves every other
    /// node's handle naming the same entry; the removed handle goes stale.
    #[test]
    fn handles_survive_unrelated_removals() {
        let mut t = tree_of(&(0..64).collect::<Vec<_>>());
        let handles: Vec<(i32, NodeKey)> = (0..64).map(|k| (k, t.search(&k).unwrap())).collect();
        let root_key = *t.key_value(t.root.unwrap()).unwrap().0;
        assert_eq!(t.remove(&root_key), Some(root_key.to_string()));
        t.check_invariants().unwrap();
        for (k, h) in handles {
            if k == root_key {
                assert!(!t.contains_node(h));
                assert!(t.key_value(h).is_none());
                assert!(t.next(h).is_none());
            } else {
                assert_eq!(t.key_value(h).map(|(k, _)| *k), Some(k));
            }
        }
    }

    #[test]
    fn iter_both_ends_meet_once() {
        let t = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
        let mut it = t.iter();
        assert_eq!(it.len(), 7);
        assert_eq!(it.next().map(|(k, _)| *k), Some(1));
        assert_eq!(it.next_back().map(|(k, _)| *k), Some(7));
        let rest: Vec<i32> = it.by_ref().map(|(k, _)| *k).collect();
        assert_eq!(rest, vec![2, 3, 4, 5, 6]);
        assert!(it.next().is_none());
        assert!(it.next_back().is_none());
    }

    #[test]
    fn iter_mut_is_key_ordered() {
        let mut t = tree_of(&[9, 1, 5, 3, 7]);
        let mut order = Vec::new();
        for (k, v) in t.iter_mut() {
            order.push(*k);
            v.push('!');
        }
        assert_eq!(order, vec![1, 3, 5, 7, 9]);
        assert_eq!(t.get(&5).map(String::as_str), Some("5!"));
    }

    /// Invariant: `iter_mut` follows key order even when arena slot order
    /// disagrees with it, as after removals free slots for later keys.
    #[test]
    fn iter_mut_orders_reused_slots() {
        let mut t = tree_of(&(0..40).collect::<Vec<_>>());
        for k in (0..40).step_by(2) {
            t.remove(&k);
        }
        for k in (100..120).rev() {
            t.insert(k, k.to_string());
        }
        let shared: Vec<i32> = t.iter().map(|(k, _)| *k).collect();
        let mut seen = Vec::new();
        for (k, v) in t.iter_mut() {
            seen.push(*k);
            v.clear();
        }
        assert_eq!(seen, shared);
        assert_eq!(t.iter_mut().len(), 40);
        assert_eq!(t.iter_mut().next_back().map(|(k, _)| *k), Some(119));
        assert!(t.iter().all(|(_, v)| v.is_empty()));
        t.check_invariants().unwrap();
    }

    #[test]
    fn into_iter_drains_in_order() {
        let t = tree_of(&[3, 1, 2]);
        let drained: Vec<(i32, String)> = t.into_iter().collect();
        assert_eq!(
            drained,
            vec![(1, "1".into()), (2, "2".into()), (3, "3".into())]
        );
        let t = tree_of(&[3, 1, 2]);
        let rev: Vec<i32> = t.into_iter().rev().map(|(k, _)| k).collect();
        assert_eq!(rev, vec![3, 2, 1]);
    }

    /// Invariant: level order visits the root first and every node once.
    #[test]
    fn level_order_visits_each_node_once() {
        let t = tree_of(&(1..=15).collect::<Vec<_>>());
        let visited: Vec<i32> = t.level_order().map(|(k, _)| *k).collect();
        assert_eq!(visited.len(), 15);
        assert_eq!(visited[0], *t.key_value(t.root.unwrap()).unwrap().0);
        let mut sorted = visited.clone();
        sorted.sort();
        assert_eq!(sorted, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn clone_is_deep() {
        let mut a = tree_of(&[1, 2, 3]);
        let b = a.clone();
        a.remove(&2);
        *a.get_mut(&1).unwrap() = "changed".into();
        assert_eq!(b.len(), 3);
        assert_eq!(b.get(&1).map(String::as_str), Some("1"));
        b.check_invariants().unwrap();
    }

    #[test]
    fn borrowed_lookup() {
        let mut t: RbTree<String, i32> = RbTree::new();
        t.insert("hello".to_string(), 1);
        assert!(t.contains_key("hello"));
        assert_eq!(t.get_key_value("hello"), Some((&"hello".to_string(), &1)));
        assert_eq!(t.remove_entry("hello"), Some(("hello".to_string(), 1)));
        assert!(t.is_empty());
    }
}
