//! Benchmarks for cell write fan-out.
//!
//! Run with: `cargo bench --package tabsync-runtime --bench fanout_bench`
//!
//! Measures one local write reaching N sibling cells in the same document,
//! and one write reaching cells in N other documents through the store.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tabsync_runtime::{CellOptions, Document, SyncConfig, SyncedCell};
use tabsync_storage::{SharedStore, StorageArea};

fn cell(doc: &Document) -> SyncedCell<u64> {
    doc.local_cell("counter", CellOptions::json().default_value(0))
}

fn bench_same_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/same_document");
    for siblings in [1usize, 8, 64] {
        let store = SharedStore::new(StorageArea::Local);
        let doc = Document::new(SyncConfig::default()).with_backend(store.attach());
        let cells: Vec<_> = (0..=siblings).map(|_| cell(&doc)).collect();
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(siblings), &siblings, |b, _| {
            b.iter(|| {
                next += 1;
                cells[0].set(black_box(next));
            });
        });
    }
    group.finish();
}

fn bench_cross_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/cross_document");
    for documents in [1usize, 8, 64] {
        let store = SharedStore::new(StorageArea::Local);
        let docs: Vec<_> = (0..=documents)
            .map(|_| Document::new(SyncConfig::default()).with_backend(store.attach()))
            .collect();
        let cells: Vec<_> = docs.iter().map(cell).collect();
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(documents), &documents, |b, _| {
            b.iter(|| {
                next += 1;
                cells[0].set(black_box(next));
            });
        });
    }
    group.finish();
}

fn bench_redundant_write(c: &mut Criterion) {
    let store = SharedStore::new(StorageArea::Local);
    let doc = Document::new(SyncConfig::default()).with_backend(store.attach());
    let counter = cell(&doc);
    counter.set(7);
    c.bench_function("write/unchanged_value", |b| {
        b.iter(|| counter.set(black_box(7)));
    });
}

criterion_group!(
    benches,
    bench_same_document,
    bench_cross_document,
    bench_redundant_write
);
criterion_main!(benches);
