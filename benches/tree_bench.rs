//! Benchmarks for detector tree resolution and condition queries
//!
//! Run with: cargo bench

use conddb::conditions::query;
use conddb::time::parse_timestamp;
use conddb::tree::resolve_path;
use conddb::{
    Condition, ConditionsDb, Detector, DetectorPath, DetectorWrapper, MemoryStore, SqliteStore,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::tempdir;

/// A tree `depth` levels deep with `fanout` children per node
fn build_tree(depth: usize, fanout: usize) -> DetectorWrapper {
    fn fill(node: &mut Detector, depth: usize, fanout: usize) {
        if depth == 0 {
            return;
        }
        for i in 0..fanout {
            let mut child = Detector::new(format!("d{}", i));
            fill(&mut child, depth - 1, fanout);
            node.subdetectors.push(child);
        }
    }

    let mut wrapper = DetectorWrapper::new("SND");
    fill(&mut wrapper.detector, depth, fanout);
    wrapper
}

fn deepest_path(depth: usize, fanout: usize) -> DetectorPath {
    let last = format!("d{}", fanout - 1);
    let mut path = String::from("SND");
    for _ in 0..depth {
        path.push('/');
        path.push_str(&last);
    }
    DetectorPath::parse(&path).unwrap()
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_path");

    for depth in [2, 4, 6] {
        let wrapper = build_tree(depth, 4);
        let path = deepest_path(depth, 4);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| resolve_path(black_box(&wrapper), black_box(&path)).unwrap())
        });
    }

    group.finish();
}

fn bench_validity_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("validity_query");

    for count in [100, 1000, 10000] {
        let mut detector = Detector::new("Veto");
        let base = parse_timestamp("2020-01-01").unwrap();
        detector.conditions = (0..count)
            .map(|i| Condition {
                name: if i % 2 == 0 { "gain" } else { "pedestal" }.to_string(),
                tag: format!("t{}", i),
                condition_type: None,
                collected_at: base,
                valid_since: base + chrono::Duration::days(i as i64),
                valid_until: base + chrono::Duration::days(i as i64 + 30),
                values: serde_json::json!(i),
            })
            .collect();
        let at = base + chrono::Duration::days(count as i64 / 2);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| query::by_name_and_validity(black_box(&detector), "gain", at, None).unwrap())
        });
    }

    group.finish();
}

fn bench_parse_timestamp(c: &mut Criterion) {
    c.bench_function("parse_timestamp", |b| {
        b.iter(|| parse_timestamp(black_box("2022-07-05 10:15:30")).unwrap())
    });
}

fn bench_list_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_runs");

    let dir = tempdir().unwrap();
    let sqlite = ConditionsDb::new(Arc::new(
        SqliteStore::open(&dir.path().join("bench.sqlite")).unwrap(),
    ));
    let memory = ConditionsDb::new(Arc::new(MemoryStore::new()));

    for db in [&sqlite, &memory] {
        db.add_fill("F1", "2022-07-05", "2022-07-06", None).unwrap();
        for i in 0..500 {
            let start = format!("2022-07-05 {:02}:{:02}", i / 60 % 24, i % 60);
            db.add_run(&format!("R{}", i), "F1", start.as_str(), start.as_str(), None)
                .unwrap();
        }
    }

    for (name, db) in [("sqlite", &sqlite), ("memory", &memory)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                db.list_runs(Some("F1"), Some("2022-07-05 04:00".into()), None)
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_validity_query,
    bench_parse_timestamp,
    bench_list_runs
);
criterion_main!(benches);
