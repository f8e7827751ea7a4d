use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mural_core::{LineOp, Rgba};
use mural_raster::Canvas;

fn bench_line_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("Raster");
    group.throughput(Throughput::Elements(1));

    let mut canvas = Canvas::with_size(1920, 1080).unwrap();
    let op = LineOp {
        color: Rgba::opaque(255, 0, 0),
        width: 4.0,
        x1: 10.0,
        y1: 10.0,
        x2: 1900.0,
        y2: 1000.0,
    };
    group.bench_function("stroke_full_diagonal", |b| {
        b.iter(|| canvas.line(black_box(&op)))
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("Raster");
    group.throughput(Throughput::Elements(1));

    let canvas = Canvas::with_size(1920, 1080).unwrap();
    group.bench_function("snapshot_1080p", |b| {
        b.iter(|| black_box(canvas.snapshot()))
    });

    group.finish();
}

criterion_group!(benches, bench_line_apply, bench_snapshot);
criterion_main!(benches);
