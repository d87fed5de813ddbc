use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use json_watch_store::{json, JsonStore};
use std::hint::black_box;
use std::path::PathBuf;
use std::time::Duration;

fn bench_path(name: &str, size: usize) -> PathBuf {
    std::env::temp_dir().join(format!("json_watch_store_bench_{}_{}.json", name, size))
}

fn filled(name: &str, size: usize) -> (JsonStore, PathBuf) {
    let path = bench_path(name, size);
    let _ = std::fs::remove_file(&path);
    let db = JsonStore::open(&path).unwrap();
    for i in 0..size {
        db.set(&format!("k{i}"), json!({"i": i, "tags": ["a", "b"]}))
            .unwrap();
    }
    (db, path)
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (db, path) = filled("get", size);
            b.iter(|| {
                for i in 0..size {
                    black_box(db.get(&format!("k{i}")));
                }
            });
            drop(db);
            let _ = std::fs::remove_file(&path);
        });
    }
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(8));
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (db, path) = filled("set", size);
            b.iter(|| db.set("hot", black_box(1)).unwrap());
            drop(db);
            let _ = std::fs::remove_file(&path);
        });
    }
}

fn bench_set_while_watching(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_while_watching");
    group.sample_size(50);
    for size in [10, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (db, path) = filled("watching", size);
            let sub = db.changes().subscribe(|| {}).unwrap();
            b.iter(|| db.set("hot", black_box(1)).unwrap());
            drop(sub);
            drop(db);
            let _ = std::fs::remove_file(&path);
        });
    }
}

criterion_group!(benches, bench_get, bench_set, bench_set_while_watching);
criterion_main!(benches);
