//! Interning throughput for the artifact storage.
//!
//! Compares a workload where every method is distinct against one where most
//! methods repeat, both on the heap and over an anonymous swap file.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use cas_storage::{ArtifactStorage, StorageOptions};

/// Generate `n` code arrays of which only `distinct` differ.
fn generate_methods(n: usize, distinct: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            let seed = (i % distinct).to_le_bytes();
            seed.iter().cycle().take(64 + i % distinct % 64).copied().collect()
        })
        .collect()
}

fn open(swap: bool) -> ArtifactStorage {
    let options = if swap {
        StorageOptions::new().with_anonymous_swap()
    } else {
        StorageOptions::new()
    };
    match ArtifactStorage::open(options) {
        Ok(storage) => storage,
        Err(err) => panic!("Unable to open benchmark storage: {err}"),
    }
}

fn bench_intern_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/intern_code");

    for (label, distinct) in [("unique", 4096), ("repeated", 64)] {
        let methods = generate_methods(4096, distinct);
        let bytes: usize = methods.iter().map(Vec::len).sum();
        group.throughput(Throughput::Bytes(bytes as u64));

        for swap in [false, true] {
            let id = BenchmarkId::new(label, if swap { "swap" } else { "heap" });
            group.bench_with_input(id, &methods, |b, methods| {
                // Mapping the swap file happens in setup, outside the timing.
                b.iter_batched(
                    || open(swap),
                    |storage| {
                        for code in methods {
                            black_box(storage.intern_code(code));
                        }
                        storage
                    },
                    BatchSize::PerIteration,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_intern_code);
criterion_main!(benches);
