use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use strix_core::CompressionLevel;
use strix_deflate::{deflate, inflate};

fn bench_deflate(c: &mut Criterion) {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let input: Vec<u8> = pattern.iter().cycle().take(256 * 1024).copied().collect();

    let mut group = c.benchmark_group("deflate");
    group.throughput(Throughput::Bytes(input.len() as u64));

    for (name, level) in [
        ("fastest", CompressionLevel::Fastest),
        ("optimal", CompressionLevel::Optimal),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| deflate(&input, level).unwrap());
        });
    }
    group.finish();
}

fn bench_inflate(c: &mut Criterion) {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let input: Vec<u8> = pattern.iter().cycle().take(256 * 1024).copied().collect();
    let compressed = deflate(&input, CompressionLevel::Optimal).unwrap();

    let mut group = c.benchmark_group("inflate");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("optimal", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(input.len());
            inflate(&compressed, &mut out).unwrap();
            out
        });
    });
    group.finish();
}

criterion_group!(benches, bench_deflate, bench_inflate);
criterion_main!(benches);
