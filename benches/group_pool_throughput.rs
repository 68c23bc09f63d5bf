//! Throughput of the grouped pool and lock primitives

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempo_rs::prelude::*;

fn bench_submit_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_drain_10k");

    for groups in [1u32, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::new("groups", groups), groups, |b, &groups| {
            b.iter(|| {
                let pool = GroupedThreadPool::with_threads(4).unwrap();
                for g in 0..groups {
                    pool.add_group(g);
                }
                let counter = Arc::new(AtomicUsize::new(0));
                for i in 0..10_000u32 {
                    let counter = counter.clone();
                    pool.execute_back(i % groups, move || {
                        counter.fetch_add(black_box(1), Ordering::Relaxed);
                    })
                    .unwrap();
                }
                pool.shutdown(true);
                black_box(counter.load(Ordering::Relaxed))
            });
        });
    }

    group.finish();
}

fn bench_submit_join(c: &mut Criterion) {
    let pool = GroupedThreadPool::with_threads(2).unwrap();
    pool.add_group(0);

    c.bench_function("submit_join_roundtrip", |b| {
        b.iter(|| {
            let handle = pool.submit_back(0, || black_box(21) * 2).unwrap();
            black_box(handle.join().unwrap())
        });
    });
}

fn bench_locks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock");

    let spin = SpinLock::new(0u64);
    group.bench_function("spin_lock", |b| {
        b.iter(|| {
            *spin.lock() += black_box(1);
        });
    });

    let mutex = Mutex::new(0u64);
    group.bench_function("parking_lot_mutex", |b| {
        b.iter(|| {
            *mutex.lock() += black_box(1);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_submit_drain, bench_submit_join, bench_locks);
criterion_main!(benches);
