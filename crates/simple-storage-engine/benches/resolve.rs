use criterion::{Criterion, black_box, criterion_group, criterion_main};
use simple_storage_engine::{GrantTable, MemoryStore, StorageAccess, StoragePath};
use std::sync::Arc;

const SD: &str = "6881-2249";

fn deep_path(depth: usize) -> String {
    (0..depth)
        .map(|level| format!(" level {level} /"))
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    group.sample_size(50);

    let raw = deep_path(32);
    group.bench_function("parse_deep_path", |b| {
        b.iter(|| {
            let path = StoragePath::parse(black_box(&raw));
            black_box(path);
        });
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.sample_size(20);

    let primary = tempfile::TempDir::new().unwrap();
    let grants = Arc::new(GrantTable::new());
    let access = StorageAccess::new(primary.path(), grants.clone());
    grants.grant(access.tree_uri(SD, ""), Arc::new(MemoryStore::new("sd")));

    let raw = deep_path(16);
    access.materialize(SD, &raw).unwrap();

    group.bench_function("resolve_existing", |b| {
        b.iter(|| {
            let node = access.resolve(SD, black_box(&raw));
            black_box(node);
        });
    });

    group.bench_function("materialize_existing", |b| {
        b.iter(|| {
            let node = access.materialize(SD, black_box(&raw));
            black_box(node);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_resolve);
criterion_main!(benches);
