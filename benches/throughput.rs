//! Throughput benchmarks

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use protoscope_core::core::splitter::{self, EmptyEntries, DEFAULT_CANDIDATES};
use protoscope_core::{loader, Analyzer, LogData};

fn scale_capture(lines: usize) -> Bytes {
    let mut data = Vec::new();
    for i in 0..lines {
        let status = if i % 7 == 0 { "US" } else { "ST" };
        data.extend_from_slice(format!("{status},GS, {:>7.2} kg\r\n", i as f64 * 0.37).as_bytes());
    }
    Bytes::from(data)
}

fn split_benchmark(c: &mut Criterion) {
    let data = scale_capture(2000);

    let mut group = c.benchmark_group("split");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("crlf", |b| {
        b.iter(|| black_box(splitter::split(black_box(&data), b"\r\n", EmptyEntries::Skip)))
    });

    group.bench_function("best_candidate", |b| {
        b.iter(|| black_box(splitter::frames(black_box(&data), DEFAULT_CANDIDATES)))
    });

    group.finish();
}

fn analysis_benchmark(c: &mut Criterion) {
    let data = scale_capture(2000);
    let log = LogData::from_buffer(data.clone(), DEFAULT_CANDIDATES);
    let dump: String = data
        .chunks(16)
        .map(|chunk| format!("{}\n", protoscope_core::core::codec::hex_string(chunk)))
        .collect();

    let mut group = c.benchmark_group("analysis");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("load_hex_dump", |b| {
        b.iter(|| black_box(loader::load_text(black_box(&dump)).map(|l| l.bytes.len())))
    });

    group.bench_function("full_pipeline", |b| {
        let analyzer = Analyzer::default();
        b.iter(|| black_box(analyzer.analyze(black_box(&log))))
    });

    group.finish();
}

criterion_group!(benches, split_benchmark, analysis_benchmark);
criterion_main!(benches);
