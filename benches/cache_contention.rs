use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use raw_image_cache::engine::{ContentSignature, RawImageBuffer, RawImageCache};
use std::sync::Arc;
use std::thread;

fn signatures(count: usize) -> Arc<Vec<ContentSignature>> {
    Arc::new(
        (0..count as u64)
            .map(|i| ContentSignature::compute(&i.to_le_bytes()))
            .collect(),
    )
}

/// Every thread mixes writes and reads over a key space larger than the cache,
/// so hits, misses and evictions all happen under the single lock.
fn hammer_cache(cache: &Arc<RawImageCache>, keys: &Arc<Vec<ContentSignature>>, threads: usize, iterations: usize) {
    let buffer = Arc::new(RawImageBuffer::filled(16, 16, [1, 2, 3, 255]).unwrap());
    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let cache = Arc::clone(cache);
        let keys = Arc::clone(keys);
        let buffer = Arc::clone(&buffer);
        handles.push(thread::spawn(move || {
            for i in 0..iterations {
                let sig = keys[(t * 7919 + i * 31) % keys.len()];
                if i % 4 == 0 {
                    cache.set(sig, Arc::clone(&buffer));
                } else {
                    let _ = cache.try_get(&sig);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_contention(c: &mut Criterion) {
    // 16 threads × 5_000 iterations = 80k cache calls
    let iterations = 5_000;
    let threads = 16;
    let keys = signatures(400);

    c.bench_function("cache_contention_default_capacity", |b| {
        b.iter_batched(
            || Arc::new(RawImageCache::default()),
            |cache| hammer_cache(&cache, &keys, threads, iterations),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("cache_contention_large_capacity", |b| {
        b.iter_batched(
            || Arc::new(RawImageCache::new(1_000).unwrap()),
            |cache| hammer_cache(&cache, &keys, threads, iterations),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(cache_contention, bench_contention);
criterion_main!(cache_contention);
