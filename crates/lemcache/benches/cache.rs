use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lemcache::{Deadline, Lemming, LemmingCache, MemoryStore, Mood};

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_lemming");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("memory_overwrite", |b| {
        let cache = LemmingCache::with_store(MemoryStore::new());
        let lemmings: Vec<_> = (0..100)
            .map(|i| Lemming::new(format!("lemming-{}", i), Mood::Happy))
            .collect();

        let mut counter = 0;
        b.iter(|| {
            cache
                .store_lemming(black_box(&lemmings[counter % 100]), Deadline::none())
                .unwrap();
            counter += 1;
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_lemming");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("memory_hit", |b| {
        let cache = LemmingCache::with_store(MemoryStore::new());
        let names: Vec<_> = (0..100).map(|i| format!("lemming-{}", i)).collect();
        for name in &names {
            cache
                .store_lemming(&Lemming::new(name.clone(), Mood::Sad), Deadline::none())
                .unwrap();
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(
                cache
                    .get_lemming(&names[counter % 100], Deadline::none())
                    .unwrap(),
            );
            counter += 1;
        });
    });

    group.bench_function("memory_miss", |b| {
        let cache = LemmingCache::with_store(MemoryStore::new());

        b.iter(|| {
            black_box(cache.get_lemming("NoSuchLemming", Deadline::none()).is_err());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_store, bench_get);
criterion_main!(benches);
