#![cfg(test)]

// Property tests for RbTree kept inside the crate so they can reach the
// crate-private invariant checker.

use crate::rb_tree::{NodeKey, RbTree};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, i32),
    Remove(u8),
    RemoveByHandle(u8),
    Mutate(u8, i32),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => (any::<u8>(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => any::<u8>().prop_map(Op::Remove),
        1 => any::<u8>().prop_map(Op::RemoveByHandle),
        1 => (any::<u8>(), any::<i32>()).prop_map(|(k, d)| Op::Mutate(k, d)),
    ];
    proptest::collection::vec(op, 1..200)
}

// Property: the tree matches a BTreeMap model after every operation.
// Invariants exercised:
// - Red-black shape: black root, no red-red edge, equal black height, BST
//   order, parent links pointing back (checked by `check_invariants`).
// - Handles returned by `insert` keep resolving to their key until that key
//   is removed, whatever else is removed in between.
// - In-order iteration, both directions, equals the model's order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_tree_matches_model(ops in arb_ops()) {
        let mut sut: RbTree<u8, i32> = RbTree::new();
        let mut model: BTreeMap<u8, i32> = BTreeMap::new();
        let mut handles: HashMap<u8, NodeKey> = HashMap::new();
        let mut stale: Vec<NodeKey> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let (h, prev) = sut.insert(k, v);
                    prop_assert_eq!(prev, model.insert(k, v));
                    if let Some(&old) = handles.get(&k) {
                        prop_assert_eq!(old, h, "replacing a value keeps its node");
                    }
                    handles.insert(k, h);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(sut.remove(&k), model.remove(&k));
                    if let Some(h) = handles.remove(&k) {
                        stale.push(h);
                    }
                }
                Op::RemoveByHandle(k) => {
                    if let Some(h) = handles.remove(&k) {
                        let (kk, vv) = sut.remove_node(h).expect("live handle removes");
                        prop_assert_eq!(kk, k);
                        prop_assert_eq!(Some(vv), model.remove(&k));
                        stale.push(h);
                    }
                }
                Op::Mutate(k, d) => {
                    if let Some(v) = sut.get_mut(&k) {
                        *v = v.wrapping_add(d);
                        let mv = model.get_mut(&k).expect("model has key");
                        *mv = mv.wrapping_add(d);
                    } else {
                        prop_assert!(!model.contains_key(&k));
                    }
                }
            }

            if let Err(e) = sut.check_invariants() {
                prop_assert!(false, "tree invariant broken: {}", e);
            }
            prop_assert_eq!(sut.len(), model.len());
            for (&k, &h) in &handles {
                prop_assert_eq!(sut.key_value(h).map(|(k, _)| *k), Some(k));
            }
            for &h in &stale {
                prop_assert!(!sut.contains_node(h));
            }
        }

        let forward: Vec<(u8, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u8, i32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&forward, &expected);
        let mut backward: Vec<(u8, i32)> = sut.iter().rev().map(|(k, v)| (*k, *v)).collect();
        backward.reverse();
        prop_assert_eq!(&backward, &expected);
        let drained: Vec<(u8, i32)> = sut.into_iter().collect();
        prop_assert_eq!(drained, expected);
    }
}

// Property: walking with `next` from `first` and `prev` from `last` visits
// every node exactly once, in opposite orders.
proptest! {
    #[test]
    fn prop_structural_walk(keys in proptest::collection::btree_set(any::<u16>(), 0..300)) {
        let mut sut = RbTree::new();
        for &k in &keys {
            sut.insert(k, ());
        }
        let mut fwd = Vec::new();
        let mut cur = sut.first();
        while let Some(h) = cur {
            fwd.push(*sut.key_value(h).expect("live").0);
            cur = sut.next(h);
        }
        let mut back = Vec::new();
        let mut cur = sut.last();
        while let Some(h) = cur {
            back.push(*sut.key_value(h).expect("live").0);
            cur = sut.prev(h);
        }
        back.reverse();
        let expected: Vec<u16> = keys.into_iter().collect();
        prop_assert_eq!(&fwd, &expected);
        prop_assert_eq!(back, expected);
    }
}
