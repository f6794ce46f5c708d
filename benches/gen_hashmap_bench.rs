use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gen_hashmap::{BuildXxHash32, GenHashMap};
use std::collections::HashMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

// Indices drawn with a second LCG so queries are not in insertion order.
fn sample(n: usize, count: usize) -> Vec<usize> {
    let mut s = 0x9e3779b97f4a7c15u64;
    (0..count)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            (s as usize) % n
        })
        .collect()
}

fn filled(seed: u64, n: usize) -> (GenHashMap<String, u64>, Vec<String>) {
    let keys: Vec<String> = lcg(seed).take(n).map(key).collect();
    let mut m = GenHashMap::with_capacity(n);
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
    }
    (m, keys)
}

fn bench_insert(c: &mut Criterion) {
    // Starts at 16 buckets, so every growth step is a generation append.
    c.bench_function("gen::insert_growing_10k", |b| {
        b.iter_batched(
            GenHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("gen::insert_presized_100k", |b| {
        b.iter_batched(
            || GenHashMap::<String, u64>::with_capacity(100_000),
            |mut m| {
                for (i, x) in lcg(2).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("std::insert_presized_100k", |b| {
        b.iter_batched(
            || HashMap::<String, u64, BuildXxHash32>::with_capacity_and_hasher(100_000, BuildXxHash32::default()),
            |mut m| {
                for (i, x) in lcg(2).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find(c: &mut Criterion) {
    c.bench_function("gen::find_hit_10k_on_100k", |b| {
        let (m, keys) = filled(7, 100_000);
        let queries: Vec<&String> = sample(keys.len(), 10_000).into_iter().map(|i| &keys[i]).collect();
        b.iter(|| {
            for k in &queries { black_box(m.get(*k)); }
        })
    });

    c.bench_function("gen::find_miss_10k_on_100k", |b| {
        let (m, _) = filled(11, 100_000);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(m.get(&k));
            }
        })
    });

    // Lookups that have to scan many generations.
    c.bench_function("gen::find_hit_1k_on_grown_5k", |b| {
        let mut m = GenHashMap::new();
        let keys: Vec<String> = lcg(13).take(5_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.insert(k.clone(), i as u64);
        }
        let queries: Vec<&String> = sample(keys.len(), 1_000).into_iter().map(|i| &keys[i]).collect();
        b.iter(|| {
            for k in &queries { black_box(m.get(*k)); }
        })
    });

    c.bench_function("std::find_hit_10k_on_100k", |b| {
        let keys: Vec<String> = lcg(7).take(100_000).map(key).collect();
        let m: HashMap<String, u64> = keys.iter().cloned().zip(0..).collect();
        let queries: Vec<&String> = sample(keys.len(), 10_000).into_iter().map(|i| &keys[i]).collect();
        b.iter(|| {
            for k in &queries { black_box(m.get(*k)); }
        })
    });
}

fn bench_remove(c: &mut Criterion) {
    c.bench_function("gen::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let (m, keys) = filled(5, 110_000);
                let mut picked: Vec<usize> = sample(keys.len(), 10_000);
                picked.sort_unstable();
                picked.dedup();
                let to_remove: Vec<String> = picked.into_iter().map(|i| keys[i].clone()).collect();
                (m, to_remove)
            },
            |(mut m, to_remove)| {
                for k in &to_remove { let _ = m.remove(k); }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iter(c: &mut Criterion) {
    c.bench_function("gen::iter_all_100k", |b| {
        let (m, _) = filled(999, 100_000);
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("gen::values_mut_increment_all_100k", |b| {
        b.iter_batched(
            || filled(1001, 100_000).0,
            |mut m| {
                for v in m.values_mut() {
                    *v = v.wrapping_add(1);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert
}
criterion_group! {
    name = benches_find;
    config = bench_config();
    targets = bench_find
}
criterion_group! {
    name = benches_remove;
    config = bench_config();
    targets = bench_remove
}
criterion_group! {
    name = benches_iter;
    config = bench_config();
    targets = bench_iter
}
criterion_main!(benches_insert, benches_find, benches_remove, benches_iter);
