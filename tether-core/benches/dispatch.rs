//! Dispatch benchmarks: write fan-out and dependency re-collection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;

use tether_core::reactive::{Effect, Runtime};

fn record(keys: usize) -> IndexMap<String, u64> {
    (0..keys).map(|n| (format!("k{n}"), 0)).collect()
}

fn fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1usize, 16, 256] {
        let runtime = Runtime::new();
        let state = runtime.wrap(record(1));
        let effects: Vec<Effect> = (0..subscribers)
            .map(|_| {
                let state = state.clone();
                runtime.effect(move || {
                    black_box(state.get("k0"));
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    state.set("k0", n);
                });
            },
        );

        drop(effects);
    }

    group.finish();
}

fn wide_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("recollect");

    for keys in [8usize, 64, 512] {
        let runtime = Runtime::new();
        let state = runtime.wrap(record(keys));
        let names: Vec<String> = (0..keys).map(|n| format!("k{n}")).collect();

        let reader = state.clone();
        let effect = runtime.effect(move || {
            for name in &names {
                black_box(reader.get(name));
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, _| {
            b.iter(|| effect.run());
        });
    }

    group.finish();
}

fn untracked_reads(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = runtime.wrap(record(1));

    c.bench_function("read_outside_effect", |b| {
        b.iter(|| black_box(state.get("k0")));
    });
}

criterion_group!(benches, fan_out, wide_reads, untracked_reads);
criterion_main!(benches);
