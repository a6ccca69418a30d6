use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use depthx_rs::{BookState, Level, LevelUpdate};

fn seeded_book(levels: usize) -> BookState {
    let bids: Vec<Level> = (0..levels).map(|i| Level::new(10_000.0 - i as f64 * 0.5, 1.0)).collect();
    let asks: Vec<Level> = (0..levels).map(|i| Level::new(10_000.5 + i as f64 * 0.5, 1.0)).collect();
    let mut book = BookState::new();
    book.apply_snapshot(&bids, &asks).unwrap();
    book
}

// mixed batch: touches behind the best, a best removal and a re-add
fn batch(size: usize) -> Vec<LevelUpdate> {
    (0..size)
        .map(|i| match i % 4 {
            0 => LevelUpdate::bid(9_990.0 - (i % 50) as f64 * 0.5, 2.0),
            1 => LevelUpdate::ask(10_010.0 + (i % 50) as f64 * 0.5, 2.0),
            2 => LevelUpdate::bid(10_000.0, 0.0),
            _ => LevelUpdate::bid(10_000.0, 1.5),
        })
        .collect()
}

fn bench_apply_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_updates");
    for size in [1usize, 50, 500] {
        let updates = batch(size);
        group.bench_function(format!("batch_{size}"), |b| {
            b.iter_batched(
                || seeded_book(1_000),
                |mut book| {
                    book.apply_updates(black_box(&updates)).unwrap();
                    book
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_depth_snapshot(c: &mut Criterion) {
    let book = seeded_book(1_000);
    c.bench_function("to_depth_snapshot_40", |b| {
        b.iter(|| black_box(book.view().to_depth_snapshot(40)))
    });
}

criterion_group!(benches, bench_apply_updates, bench_depth_snapshot);
criterion_main!(benches);
