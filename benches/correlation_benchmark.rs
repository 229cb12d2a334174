#[path = "../src/test_support.rs"]
mod test_support;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use correlink::{correlate, CorrelationConfig, Correlator, EntityKind};
use test_support::generate_devices;

fn bench_correlate(c: &mut Criterion) {
    let config = CorrelationConfig::new();
    let mut group = c.benchmark_group("correlate");

    for &size in &[1_000u32, 5_000, 20_000] {
        let population = generate_devices(size, 0.25, 42);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &population, |b, records| {
            b.iter(|| black_box(correlate(EntityKind::Device, records, &config)));
        });
    }

    group.finish();
}

fn bench_full_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlate_and_apply");

    for &size in &[1_000u32, 5_000] {
        let population = generate_devices(size, 0.25, 42);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &population, |b, records| {
            b.iter(|| {
                let correlator = Correlator::new(CorrelationConfig::new());
                correlator
                    .correlate_cycle(EntityKind::Device, records)
                    .expect("cycle should apply");
                black_box(correlator.entity_count(EntityKind::Device))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_correlate, bench_full_cycle);
criterion_main!(benches);
