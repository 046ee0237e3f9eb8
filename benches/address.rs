//! Benchmarks for address allocation
//!
//! Run with: cargo bench --bench address

use criterion::{criterion_group, criterion_main, Criterion};
use ike_harness::{AddressAllocator, HarnessConfig, Role};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

fn bench_next(c: &mut Criterion) {
    let allocator = AddressAllocator::new(&HarnessConfig::default()).unwrap_or_else(|err| {
        panic!("default config must be valid: {err}");
    });

    c.bench_function("next_local", |b| {
        b.iter(|| black_box(allocator.next(Role::Local)));
    });
    c.bench_function("next_pair_then_reset", |b| {
        b.iter(|| {
            let pair = (allocator.next_local_address(), allocator.next_remote_address());
            allocator.reset_all();
            black_box(pair)
        });
    });
}

fn bench_contended(c: &mut Criterion) {
    let allocator = Arc::new(
        AddressAllocator::new(&HarnessConfig::default())
            .unwrap_or_else(|err| panic!("default config must be valid: {err}")),
    );

    c.bench_function("next_local_4_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let allocator = allocator.clone();
                    thread::spawn(move || {
                        for _ in 0..64 {
                            black_box(allocator.next_local_address());
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
        });
    });
}

criterion_group!(benches, bench_next, bench_contended);
criterion_main!(benches);
