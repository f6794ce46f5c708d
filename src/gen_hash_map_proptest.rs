#![cfg(test)]

// Property tests for GenHashMap kept inside the crate so they can check the
// directory's internal invariants after every step.

use crate::gen_hash_map::GenHashMap;
use crate::iter::{Position, PositionError};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys and shorter
// op lists.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Remove(usize),
    RemoveAtFound(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Retain(i32),
    Rehash(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            8 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::RemoveAtFound),
            2 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => any::<i32>().prop_map(OpI::Retain),
            1 => (0usize..100).prop_map(OpI::Rehash),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    mut sut: GenHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Position> = HashMap::new();
    let mut stale: Vec<Position> = Vec::new();
    let calls = Rc::new(Cell::new(0));

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let (pos, inserted) = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already);
                if let Some(&old) = live.get(&k) {
                    prop_assert_eq!(old, pos, "overwrite keeps the entry in place");
                }
                live.insert(k.clone(), pos);
                model.insert(k, v);
            }
            OpI::InsertWith(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let counter = calls.clone();
                let before = counter.get();
                let (pos, inserted) = sut.insert_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                });
                prop_assert_eq!(inserted, !already);
                prop_assert_eq!(calls.get(), before + usize::from(inserted));
                if inserted {
                    model.insert(k.clone(), v);
                    live.insert(k, pos);
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                if let Some(p) = live.remove(&k) {
                    stale.push(p);
                }
            }
            OpI::RemoveAtFound(i) => {
                let k = key_from(&pool, i);
                let pos = sut.find(&k);
                match live.remove(&k) {
                    Some(p) => {
                        prop_assert_eq!(pos, p);
                        let expected_next = sut.advance(pos).expect("live position");
                        let (kk, vv, next) = sut.remove_at(pos).expect("live position");
                        prop_assert_eq!(next, expected_next);
                        prop_assert_eq!(&kk, &k);
                        prop_assert_eq!(Some(vv), model.remove(&k));
                        stale.push(p);
                    }
                    None => {
                        prop_assert!(pos.is_end());
                        prop_assert_eq!(sut.remove_at(pos).err(), Some(PositionError::End));
                    }
                }
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                let pos = sut.find(&k);
                prop_assert_eq!(!pos.is_end(), model.contains_key(&k));
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.at(&k).ok(), model.get(&k));
                if let Some(&p) = live.get(&k) {
                    prop_assert_eq!(p, pos);
                }
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(&p) = live.get(&k) {
                    let (_, v) = sut.get_at_mut(p).expect("live position resolves");
                    *v = v.wrapping_add(d);
                    let mv = model.get_mut(&k).expect("model has key");
                    *mv = mv.wrapping_add(d);
                }
            }
            OpI::Retain(pivot) => {
                sut.retain(|_, v| *v < pivot);
                model.retain(|_, v| *v < pivot);
                let gone: Vec<Key> = live
                    .keys()
                    .filter(|k| !model.contains_key(*k))
                    .cloned()
                    .collect();
                for k in gone {
                    stale.extend(live.remove(&k));
                }
            }
            OpI::Rehash(n) => {
                // Rebuilding moves every entry, so all positions go stale.
                let moved = sut.generation_count() > 1 || n > sut.bucket_count();
                sut.rehash(n);
                if moved {
                    live.clear();
                    stale.clear();
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                live.clear();
                stale.clear();
            }
            OpI::Iterate => {
                let s_keys: Vec<Key> = sut.keys().cloned().collect();
                let unique: BTreeSet<Key> = s_keys.iter().cloned().collect();
                prop_assert_eq!(unique.len(), s_keys.len(), "each key yielded once");
                let m_keys: BTreeSet<Key> = model.keys().cloned().collect();
                prop_assert_eq!(unique, m_keys);
                let mut back: Vec<Key> = sut.keys().rev().cloned().collect();
                back.reverse();
                prop_assert_eq!(&back, &s_keys);
                let walk = sut.walk_coordinates();
                prop_assert!(
                    walk.windows(2).all(|w| w[0] < w[1]),
                    "walk not ordered by (generation, bucket, key)"
                );
                let walked: Vec<Key> = walk.into_iter().map(|(_, _, k)| k.clone()).collect();
                prop_assert_eq!(walked, s_keys);
            }
        }

        // Post-conditions after each op.
        if let Err(e) = sut.check_invariants() {
            prop_assert!(false, "directory invariant broken: {}", e);
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.iter().count(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.load_factor() <= sut.max_load_factor());
        for &p in &stale {
            prop_assert_eq!(sut.get_at(p).err(), Some(PositionError::Stale));
        }
        for (k, &p) in &live {
            let (kk, vv) = sut.get_at(p).expect("live position resolves");
            prop_assert_eq!(kk, k);
            prop_assert_eq!(Some(vv), model.get(k));
        }
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Each key is stored at most once, whichever generation holds it.
// - `len` equals the number of entries iteration yields.
// - Every generation's presence bits match its non-empty buckets and every
//   bucket tree keeps its red-black shape.
// - Positions of live entries are stable across inserts and removals of
//   other entries; positions of removed entries are reported stale.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(GenHashMap::new(), pool, ops)?;
    }
}

// Collision variant: a constant hasher sends every key to bucket 0, so each
// generation has a single occupied bucket and all ordering falls to the
// trees.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(GenHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: growth never relocates an entry; a position taken right after
// insertion still resolves after any number of later inserts.
proptest! {
    #[test]
    fn prop_growth_keeps_positions(keys in proptest::collection::hash_set(any::<u64>(), 1..600)) {
        let mut sut: GenHashMap<u64, u64> = GenHashMap::new();
        let mut taken = Vec::new();
        for &k in &keys {
            let (pos, inserted) = sut.insert(k, !k);
            prop_assert!(inserted);
            taken.push((k, pos));
        }
        prop_assert_eq!(sut.bucket_count(), 16);
        for (k, pos) in taken {
            prop_assert_eq!(sut.get_at(pos), Ok((&k, &!k)));
        }
        prop_assert!(sut.check_invariants().is_ok());
    }
}
