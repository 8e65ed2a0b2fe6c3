//! Benchmarks for dialect detection, parsing and translation.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::net::SocketAddr;
use udp_logger_relay::{
    DialectSelection, Pipeline, SourceFilter, StationProfile, detect, parse, samples::SAMPLES,
};

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    group.throughput(Throughput::Elements(SAMPLES.len() as u64));
    group.bench_function("all_samples", |b| {
        b.iter(|| {
            for sample in SAMPLES {
                let _ = detect(black_box(sample.payload));
            }
        })
    });

    let noise = "\u{1}\u{2}\u{3}\u{4}binary\u{5}\u{6}\u{7}";
    group.throughput(Throughput::Elements(1));
    group.bench_function("binary_noise", |b| b.iter(|| detect(black_box(noise))));

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for sample in SAMPLES {
        group.throughput(Throughput::Elements(1));
        group.bench_function(sample.name, |b| {
            b.iter(|| parse(black_box(sample.payload), sample.dialect))
        });
    }

    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");

    let pipeline = Pipeline::new(
        SourceFilter::new(2333),
        DialectSelection::Auto,
        StationProfile::default(),
    );
    let source: SocketAddr = "127.0.0.1:2237".parse().unwrap();

    group.throughput(Throughput::Elements(SAMPLES.len() as u64));
    group.bench_function("all_samples", |b| {
        b.iter(|| {
            for sample in SAMPLES {
                let _ = pipeline.process(black_box(sample.payload.as_bytes()), source);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_detect, bench_parse, bench_translate);
criterion_main!(benches);
