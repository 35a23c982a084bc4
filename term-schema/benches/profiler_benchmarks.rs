//! Benchmarks for document expansion and full profiling runs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::time::Duration;
use term_schema::bson::{ObjectId, Value};
use term_schema::prelude::*;
use tokio::runtime::Runtime;

fn random_documents(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let mut id = [0u8; 12];
            rng.fill(&mut id[..]);
            let tags = (0..rng.random_range(0..8))
                .map(|t| Value::String(format!("tag-{t}")))
                .collect();
            DocumentBuilder::new()
                .object_id("_id", ObjectId::from_bytes(id))
                .int64("seq", i as i64)
                .double("score", rng.random_range(0.0..100.0))
                .string("status", ["new", "active", "closed"][rng.random_range(0..3)])
                .datetime("created", 1_700_000_000_000 + rng.random_range(0..86_400_000i64))
                .document(
                    "owner",
                    DocumentBuilder::new()
                        .string("name", format!("user-{}", rng.random_range(0..50)))
                        .int32("age", rng.random_range(18..90)),
                )
                .array("tags", tags)
                .build()
        })
        .collect()
}

fn bench_expand(c: &mut Criterion) {
    let docs = random_documents(1_000, 7);
    let bytes: usize = docs.iter().map(Vec::len).sum();

    let mut group = c.benchmark_group("expand");
    group.throughput(Throughput::Bytes(bytes as u64));

    for (name, config) in [
        ("names_only", ExpandConfig::default()),
        (
            "values_and_lengths",
            ExpandConfig {
                store_value: true,
                store_string_length: true,
                store_array_length: true,
                store_object_length: true,
                ..ExpandConfig::default()
            },
        ),
    ] {
        let expander = Expander::new(config);
        group.bench_with_input(BenchmarkId::new("documents", name), &docs, |b, docs| {
            let mut out = Vec::new();
            b.iter(|| {
                for doc in docs {
                    out.clear();
                    expander.expand_into(black_box(doc), &mut out).unwrap();
                }
                black_box(out.len())
            });
        });
    }

    group.finish();
}

fn bench_profile(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let docs = random_documents(5_000, 11);

    let mut group = c.benchmark_group("profile");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(docs.len() as u64));

    for (name, config) in [
        ("counts_only", ProfileConfig::default()),
        ("full_statistics", ProfileConfig::full()),
    ] {
        for concurrency in [1, 4] {
            let profiler = Profiler::new(config.clone().with_concurrency(concurrency)).unwrap();
            group.bench_with_input(
                BenchmarkId::new(name, concurrency),
                &docs,
                |b, docs| {
                    b.iter(|| {
                        rt.block_on(profiler.profile_documents(black_box(docs.clone())))
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_expand, bench_profile);
criterion_main!(benches);
