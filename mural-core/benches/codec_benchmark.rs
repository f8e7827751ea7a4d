use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mural_core::{Operation, Rgba};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Codec");
    group.throughput(Throughput::Elements(1));

    let line = Operation::line(Rgba::opaque(255, 0, 0), 2.0, 0.0, 0.0, 100.0, 100.0);
    group.bench_function("encode_line", |b| {
        b.iter(|| black_box(&line).encode().unwrap())
    });

    let text = Operation::text(Rgba::opaque(0, 0, 0), 12.0, 5.0, 5.0, "A");
    group.bench_function("encode_text", |b| {
        b.iter(|| black_box(&text).encode().unwrap())
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Codec");
    group.throughput(Throughput::Elements(1));

    let line = Operation::line(Rgba::opaque(255, 0, 0), 2.0, 0.0, 0.0, 100.0, 100.0)
        .encode()
        .unwrap();
    group.bench_function("decode_line", |b| {
        b.iter(|| Operation::decode(black_box(&line)).unwrap())
    });

    // Snapshot-sized init: the join-time worst case.
    let data: Vec<u8> = (0..256u32 * 256 * 4).map(|i| (i % 251) as u8).collect();
    let init = Operation::init(256, 256, data).encode().unwrap();
    group.bench_function("decode_snapshot_256", |b| {
        b.iter(|| Operation::decode(black_box(&init)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
