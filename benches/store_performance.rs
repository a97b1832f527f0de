use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use snipkeep::manager::{ManagerOptions, SnippetInput, SnippetManager};
use snipkeep::snippet::Snippet;
use snipkeep::store::{Store, DB_FILE_NAME};
use tempfile::TempDir;

/// Fixture generator for realistic snippet collections
mod fixtures {
    use super::*;

    const TOOLS: [&str; 6] = ["git", "docker", "cargo", "kubectl", "ssh", "find"];

    pub fn snippet(i: usize) -> Snippet {
        let tool = TOOLS[i % TOOLS.len()];
        Snippet::new(format!("{tool} recipe {i}"), format!("{tool} --flag-{i} target-{i}"))
            .with_description(format!("Handy {tool} one-liner number {i}"))
            .with_tags(format!("{tool},shell,batch-{}", i % 10))
    }

    pub fn populated_store(dir: &TempDir, count: usize) -> Store {
        let store = Store::open(dir.path().join(DB_FILE_NAME)).unwrap();
        for i in 0..count {
            store.insert(&snippet(i)).unwrap();
        }
        store
    }
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("store_insert", |b| {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join(DB_FILE_NAME)).unwrap();
        let mut i = 0;

        b.iter(|| {
            i += 1;
            black_box(store.insert(black_box(&fixtures::snippet(i))).unwrap());
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_search");

    for count in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::new("snippets", count), &count, |b, &count| {
            let temp_dir = TempDir::new().unwrap();
            let store = fixtures::populated_store(&temp_dir, count);
            let tags = vec!["docker".to_string(), "batch-3".to_string()];

            b.iter(|| {
                let hits = store.search(black_box("recipe 4"), black_box(&tags)).unwrap();
                black_box(hits);
            });
        });
    }

    group.finish();
}

fn bench_get_all(c: &mut Criterion) {
    c.bench_function("store_get_all_1000", |b| {
        let temp_dir = TempDir::new().unwrap();
        let store = fixtures::populated_store(&temp_dir, 1_000);

        b.iter(|| {
            black_box(store.get_all().unwrap());
        });
    });
}

fn bench_bracketed_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_add");
    group.sample_size(20);

    for snapshots in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("snapshots", snapshots),
            &snapshots,
            |b, &snapshots| {
                let temp_dir = TempDir::new().unwrap();
                drop(fixtures::populated_store(&temp_dir, 500));
                let options = ManagerOptions {
                    snapshots,
                    ..ManagerOptions::default()
                };
                let manager =
                    SnippetManager::open(temp_dir.path().join(DB_FILE_NAME), options).unwrap();
                let mut i = 0;

                b.iter(|| {
                    i += 1;
                    let input = SnippetInput::new(format!("bench {i}"), "echo bench");
                    black_box(manager.add(&input, true).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_search,
    bench_get_all,
    bench_bracketed_add
);
criterion_main!(benches);
