//! A lighter bench than the FIFO's throughput suite: `load`'s amortized
//! fast path is the thing worth measuring here, since it is the one
//! operation every other op (`store`, `exchange`, `compare_exchange`)
//! eventually settles against.

use atomic_shared_ptr::{make_shared, AtomicSharedPtr};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

const LOADS_PER_ITER: u64 = 1_000_000;

fn bench_single_thread_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");
    group.throughput(Throughput::Elements(LOADS_PER_ITER));

    group.bench_function("load", |b| {
        let slot = AtomicSharedPtr::new(Some(make_shared(42u64)));
        b.iter(|| {
            for _ in 0..LOADS_PER_ITER {
                let loaded = slot.load();
                black_box(&loaded);
            }
        });
    });

    group.finish();
}

fn bench_concurrent_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.throughput(Throughput::Elements(LOADS_PER_ITER));

    group.bench_function("load_4_threads", |b| {
        b.iter(|| {
            let slot = Arc::new(AtomicSharedPtr::new(Some(make_shared(42u64))));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let slot = Arc::clone(&slot);
                    thread::spawn(move || {
                        for _ in 0..(LOADS_PER_ITER / 4) {
                            black_box(slot.load());
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

fn bench_store_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");

    group.bench_function("store", |b| {
        let slot = AtomicSharedPtr::new(None::<atomic_shared_ptr::SharedPtr<u64>>);
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            slot.store(Some(make_shared(counter)));
        });
    });

    group.bench_function("exchange", |b| {
        let slot = AtomicSharedPtr::new(Some(make_shared(0u64)));
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            black_box(slot.exchange(Some(make_shared(counter))));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_thread_load, bench_concurrent_load, bench_store_exchange);
criterion_main!(benches);
