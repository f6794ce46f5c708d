// GenHashMap integration suite.
//
// Each test documents what behavior is being verified. The core invariants
// exercised:
// - Uniqueness: a key is stored once; re-inserting overwrites the value.
// - Growth: appending generations keeps every key findable and never moves
//   an existing entry.
// - Iteration: every entry is yielded exactly once and `len` agrees.
// - Positions: detached cursors walk, dereference and erase entries, and are
//   reported stale once their entry is gone.
// - Value semantics: clone is deep, move leaves a valid empty map.
use gen_hashmap::iter::Iter;
use gen_hashmap::{BuildXxHash32, GenHashMap, KeyNotFound, Position, PositionError};
use std::collections::{BTreeMap, HashMap};

fn sorted<K: Ord + Clone, V: Clone>(it: Iter<'_, K, V>) -> Vec<(K, V)> {
    let mut v: Vec<(K, V)> = it.map(|(k, v)| (k.clone(), v.clone())).collect();
    v.sort_by(|a, b| a.0.cmp(&b.0));
    v
}

// Test: the basic insert/find/erase walk-through.
// Verifies: find after erase, iteration contents, `at` on a missing key.
#[test]
fn insert_find_erase_walkthrough() {
    let mut m: GenHashMap<i32, String> = GenHashMap::new();
    m.insert(1, "One".to_string());
    m.insert(2, "Two".to_string());
    m.insert(3, "Three".to_string());
    assert_eq!(m.len(), 3);

    let pos = m.find(&2);
    assert!(!pos.is_end());
    assert_eq!(m.get_at(pos).map(|(_, v)| v.as_str()), Ok("Two"));

    assert!(m.erase(&2));
    assert_eq!(m.len(), 2);
    assert!(!m.erase(&2), "second erase finds nothing");
    assert!(m.find(&2).is_end());

    let rest: BTreeMap<i32, String> = m.iter().map(|(k, v)| (*k, v.clone())).collect();
    let expected: BTreeMap<i32, String> =
        [(1, "One".to_string()), (3, "Three".to_string())].into();
    assert_eq!(rest, expected);

    assert_eq!(m.at(&99), Err(KeyNotFound));
    assert!(!m.contains_key(&99));
    assert_eq!(KeyNotFound.to_string(), "key not found");
}

// Test: growth across several generation appends.
// Verifies: every key remains findable; bucket count is unchanged.
#[test]
fn growth_across_generations_keeps_keys() {
    let mut m: GenHashMap<u64, u64> = GenHashMap::new();
    for k in 0..5_000u64 {
        m.insert(k, k * k);
    }
    assert!(m.generation_count() >= 3);
    assert_eq!(m.bucket_count(), 16);
    assert_eq!(m.len(), 5_000);
    for k in 0..5_000u64 {
        assert_eq!(m.get(&k), Some(&(k * k)), "key {k}");
    }
    assert_eq!(m.iter().count(), 5_000);
}

// Test: insert then erase everything.
// Verifies: len returns to 0 and begin == end.
#[test]
fn insert_then_erase_round_trip() {
    let mut m: GenHashMap<String, usize> = GenHashMap::new();
    for i in 0..300 {
        m.insert(format!("key-{i}"), i);
    }
    for i in 0..300 {
        assert_eq!(m.remove(&format!("key-{i}")), Some(i));
    }
    assert_eq!(m.len(), 0);
    assert!(m.is_empty());
    assert_eq!(m.begin(), m.end());
    assert_eq!(m.iter().next(), None);
}

// Test: overwrite semantics of insert and the value-returning variants.
#[test]
fn insert_overwrites_and_variants() {
    let mut m: GenHashMap<&str, i32> = GenHashMap::new();
    let (p1, new1) = m.insert("a", 1);
    let (p2, new2) = m.insert("a", 2);
    assert!(new1 && !new2);
    assert_eq!(p1, p2);
    assert_eq!(m["a"], 2);

    assert_eq!(m.replace("a", 3), Some(2));
    assert_eq!(m.replace("b", 4), None);

    let (_, inserted) = m.insert_with("a", || panic!("must not build for a present key"));
    assert!(!inserted);
    assert_eq!(m.get(&"a"), Some(&3));

    *m.get_or_insert_with("c", || 10) += 1;
    assert_eq!(m.get(&"c"), Some(&11));
    *m.get_or_insert_default("d") += 7;
    assert_eq!(m.get(&"d"), Some(&7));

    let hinted = m.insert_hint(m.end(), "e", 5);
    assert_eq!(m.get_at(hinted), Ok((&"e", &5)));
    m.emplace(("f", 6));
    assert_eq!(m.get_key_value(&"f"), Some((&"f", &6)));

    *m.at_mut(&"f").unwrap() = 60;
    assert_eq!(m.at(&"f"), Ok(&60));
    assert!(m.at_mut(&"zz").is_err());
    assert_eq!(m.len(), 6);
}

// Test: borrowed-form lookups with String keys.
#[test]
fn borrowed_lookups() {
    let mut m: GenHashMap<String, u8> = GenHashMap::new();
    m.insert("alpha".to_string(), 1);
    assert_eq!(m.get("alpha"), Some(&1));
    assert!(m.contains_key("alpha"));
    assert_eq!(m.remove_entry("alpha"), Some(("alpha".to_string(), 1)));
    assert!(!m.contains_key("alpha"));
}

// Test: Index panics on a missing key.
#[test]
#[should_panic(expected = "key not found")]
fn index_missing_key_panics() {
    let m: GenHashMap<u32, u32> = GenHashMap::new();
    let _ = m[&7];
}

// Test: clone is deep.
// Verifies: mutating the clone leaves the original untouched.
#[test]
fn clone_is_deep() {
    let mut a: GenHashMap<u32, Vec<u32>> = GenHashMap::new();
    for k in 0..100 {
        a.insert(k, vec![k]);
    }
    let mut b = a.clone();
    assert_eq!(a, b);
    b.get_mut(&5).unwrap().push(99);
    b.remove(&6);
    b.insert(1000, vec![]);
    assert_eq!(a.get(&5), Some(&vec![5]));
    assert_eq!(a.get(&6), Some(&vec![6]));
    assert!(!a.contains_key(&1000));
    assert_ne!(a, b);
    assert_eq!(a.generation_count(), a.clone().generation_count());
}

// Test: moving out leaves a valid empty map.
#[test]
fn take_leaves_empty_map() {
    let mut a: GenHashMap<u32, u32> = (0..50).map(|k| (k, k)).collect();
    let b = std::mem::take(&mut a);
    assert_eq!(b.len(), 50);
    assert!(a.is_empty());
    assert_eq!(a.bucket_count(), 16);
    a.insert(1, 1);
    assert_eq!(a.get(&1), Some(&1));
}

// Test: equality ignores layout (generation count, bucket count).
#[test]
fn equality_is_by_contents() {
    let grown: GenHashMap<u32, u32> = {
        let mut m = GenHashMap::new();
        for k in 0..200 {
            m.insert(k, k + 1);
        }
        m
    };
    let mut sized: GenHashMap<u32, u32> = GenHashMap::with_capacity(500);
    sized.extend((0..200).rev().map(|k| (k, k + 1)));
    assert_ne!(grown.generation_count(), sized.generation_count());
    assert_eq!(grown, sized);
}

// Test: rehash and reserve collapse generations and keep entries.
#[test]
fn rehash_and_reserve() {
    let mut m: GenHashMap<u32, u32> = GenHashMap::new();
    for k in 0..1_000 {
        m.insert(k, k);
    }
    assert!(m.generation_count() > 1);
    m.rehash(4_096);
    assert_eq!(m.bucket_count(), 4_096);
    assert_eq!(m.generation_count(), 1);
    assert_eq!(m.len(), 1_000);

    m.rehash(10);
    assert_eq!(m.bucket_count(), 4_096, "rehash never shrinks");

    // `reserve` takes a total count; 1 000 entries already fit.
    m.reserve(1_000);
    assert_eq!(m.bucket_count(), 4_096);

    m.reserve(10_000);
    assert_eq!(m.bucket_count(), 16_384);
    assert!(m.bucket_count() as f64 * 0.75 >= 10_000.0);
    assert_eq!(m.generation_count(), 1);
    for k in 0..1_000 {
        assert_eq!(m.get(&k), Some(&k));
    }
}

// Test: clear keeps the bucket count and the map stays usable.
#[test]
fn clear_keeps_bucket_count() {
    let mut m: GenHashMap<u32, u32> = GenHashMap::with_capacity(100);
    let cap = m.bucket_count();
    for k in 0..1_000 {
        m.insert(k, k);
    }
    m.clear();
    assert!(m.is_empty());
    assert_eq!(m.bucket_count(), cap);
    assert_eq!(m.generation_count(), 1);
    m.insert(3, 3);
    assert_eq!(m.len(), 1);
}

// Test: the iterator family agrees with itself and with len.
#[test]
fn iterators_agree() {
    let mut m: GenHashMap<u32, u32> = (0..500).map(|k| (k, k)).collect();
    assert_eq!(m.iter().len(), 500);
    assert_eq!(m.keys().count(), 500);
    assert_eq!(m.values().copied().sum::<u32>(), (0..500).sum());

    for v in m.values_mut() {
        *v *= 2;
    }
    for (k, v) in &mut m {
        *v += *k;
    }
    for (k, v) in &m {
        assert_eq!(*v, 3 * *k);
    }

    let fwd: Vec<u32> = m.keys().copied().collect();
    let mut back: Vec<u32> = m.keys().rev().copied().collect();
    back.reverse();
    assert_eq!(fwd, back);
    let muts: Vec<u32> = m.iter_mut().map(|(k, _)| *k).collect();
    assert_eq!(muts, fwd, "iter_mut walks in the same order as iter");

    let owned: Vec<(u32, u32)> = m.clone().into_iter().collect();
    assert_eq!(owned.iter().map(|(k, _)| *k).collect::<Vec<_>>(), fwd);
    assert_eq!(sorted(m.iter()).len(), 500);
}

// Test: positions erase a half-open span and report errors on misuse.
#[test]
fn positions_erase_and_errors() {
    let mut m: GenHashMap<u32, u32> = (0..100).map(|k| (k, k)).collect();
    assert_eq!(m.get_at(Position::END), Err(PositionError::End));
    assert_eq!(m.end(), Position::END);

    let first = m.begin();
    let third = m.advance(m.advance(first).unwrap()).unwrap();
    let (k0, _) = m.get_at(first).map(|(k, v)| (*k, *v)).unwrap();
    assert_eq!(m.remove_range(first, third), Ok(third));
    assert_eq!(m.len(), 98);
    assert!(!m.contains_key(&k0));
    assert_eq!(m.begin(), third);

    assert_eq!(m.get_at(first), Err(PositionError::Stale));
    assert_eq!(m.advance(first), Err(PositionError::Stale));
    assert_eq!(m.remove_range(m.begin(), first), Err(PositionError::Stale));
    assert_eq!(m.len(), 98, "a stale bound removes nothing");
    assert_eq!(m.retreat(m.begin()), Err(PositionError::End));

    if let Ok((_, v)) = m.get_at_mut(third) {
        *v = 1234;
    }
    assert_eq!(m.get_at(third).map(|(_, v)| *v), Ok(1234));

    let mut pos = m.begin();
    while !pos.is_end() {
        let (_, _, next) = m.remove_at(pos).unwrap();
        pos = next;
    }
    assert!(m.is_empty());
    assert_eq!(PositionError::Stale.to_string(), "position refers to a removed entry");
}

// Test: a custom BuildHasher and a seeded XXH32 both work end to end.
#[test]
fn custom_hashers() {
    let mut seeded: GenHashMap<u32, u32> =
        GenHashMap::with_hasher(BuildXxHash32::with_seed(0xdead_beef));
    seeded.extend((0..100).map(|k| (k, k)));
    assert_eq!(seeded.hasher().seed(), 0xdead_beef);
    assert_eq!(seeded.len(), 100);

    let mut std_hashed: GenHashMap<u32, u32, std::collections::hash_map::RandomState> =
        GenHashMap::default();
    std_hashed.extend(seeded.iter().map(|(k, v)| (*k, *v)));
    assert!(std_hashed.iter().all(|(k, v)| seeded.get(k) == Some(v)));
}

// Test: construction helpers agree with a std HashMap model.
#[test]
fn from_and_extend() {
    let arr: GenHashMap<u8, char> = GenHashMap::from([(1, 'a'), (2, 'b'), (1, 'c')]);
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[&1], 'c');

    let mut m: GenHashMap<u8, char> = GenHashMap::new();
    let src: HashMap<u8, char> = [(5, 'x'), (6, 'y')].into();
    m.extend(src.iter());
    assert_eq!(m.len(), 2);
    assert_eq!(format!("{:?}", GenHashMap::<u8, u8>::new()), "{}");
    assert_eq!(m.max_load_factor(), 0.75);
    assert!(m.load_factor() > 0.0 && m.load_factor() <= 2.0 / 16.0);
    assert!(m.max_size() > 0);
}

// Test: retain filters across generations.
#[test]
fn retain_across_generations() {
    let mut m: GenHashMap<u32, u32> = GenHashMap::new();
    for k in 0..1_000 {
        m.insert(k, k);
    }
    m.retain(|k, _| k % 10 == 0);
    assert_eq!(m.len(), 100);
    assert_eq!(m.iter().count(), 100);
    assert!(m.keys().all(|k| k % 10 == 0));
}
