//! Staging and header-check benchmarks.
//!
//! Measures the copy path a bundled model takes before native construction
//! and the cost of the format signature check.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ondevice_core::engine::signature::{self, GGUF, TFLITE};
use ondevice_core::models::{EngineKind, ModelConfig, ModelDescriptor};
use ondevice_core::staging::{DirAssetSource, ModelStorage, StagingResolver};

fn bench_signature_inspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_inspect");
    let known = [GGUF, TFLITE];

    for (name, header) in [
        ("gguf", b"GGUF\x03\0\0\0".as_slice()),
        ("tflite", b"\x1c\0\0\0TFL3".as_slice()),
        ("unknown", b"\0\0\0\0XXXX".as_slice()),
    ] {
        group.throughput(Throughput::Elements(1));
        group.bench_function(name, |b| {
            b.iter(|| signature::inspect(black_box(header), &known))
        });
    }

    group.finish();
}

fn bench_ensure_local_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensure_local_file");
    group.sample_size(20);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for size_mb in [1usize, 8, 32] {
        let assets = tempfile::tempdir().unwrap();
        let docs = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..size_mb * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(assets.path().join("model.tflite"), &payload).unwrap();

        let resolver = StagingResolver::new(
            Arc::new(DirAssetSource::new(assets.path())),
            ModelStorage::new(docs.path()),
        );
        let descriptor = ModelDescriptor::new("bench", "model.tflite", EngineKind::TensorGraph)
            .with_config(ModelConfig::new().with("isBundled", true));

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::new("bundled", format!("{size_mb}MB")), &descriptor, |b, d| {
            b.iter(|| {
                runtime
                    .block_on(resolver.ensure_local_file(d, dest.path()))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_signature_inspect, bench_ensure_local_file);
criterion_main!(benches);
