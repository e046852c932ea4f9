use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shelfdb::{BookStore, NewBook};
use shelfsearch::{
    HashSearch, IndexCache, IndexedSearch, Lookup, SearchStrategy, SequentialSearch,
};
use tempfile::TempDir;

const ROWS: usize = 5000;

fn populated(dir: &TempDir) -> Arc<BookStore> {
    let store = BookStore::open(dir.path()).unwrap();
    for i in 0..ROWS {
        store
            .insert(NewBook::new(format!("Title {}", i), "Author", None))
            .unwrap();
    }
    Arc::new(store)
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategies");
    group.sample_size(20);

    let dir = TempDir::new().unwrap();
    let store = populated(&dir);
    let cache = Arc::new(IndexCache::new());

    let strategies: Vec<Box<dyn SearchStrategy>> = vec![
        Box::new(SequentialSearch::new(Arc::clone(&store))),
        Box::new(IndexedSearch::new(Arc::clone(&store))),
        Box::new(HashSearch::new(Arc::clone(&store), Arc::clone(&cache))),
    ];

    let lookups = [
        ("id_last", Lookup::ById(ROWS as u64)),
        ("title_last", Lookup::ByTitle(format!("TITLE {}", ROWS - 1))),
    ];

    for strategy in &strategies {
        for (case, lookup) in &lookups {
            group.bench_with_input(BenchmarkId::new(strategy.name(), case), lookup, |b, lookup| {
                b.iter(|| black_box(strategy.search(lookup).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_hash_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_cold");
    group.sample_size(20);

    let dir = TempDir::new().unwrap();
    let store = populated(&dir);
    let cache = Arc::new(IndexCache::new());
    let strategy = HashSearch::new(Arc::clone(&store), Arc::clone(&cache));
    let lookup = Lookup::ById(1);

    group.bench_function("build_then_lookup", |b| {
        b.iter(|| {
            cache.invalidate();
            black_box(strategy.search(&lookup).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_hash_cold);
criterion_main!(benches);
