//! The three search strategies under comparison
//!
//! Every strategy answers the same question, "which record matches this
//! lookup", and reports how long it took. Timing starts just before the first
//! store or cache access and stops once the result is in hand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shelfdb::Book;
use tracing::trace;

use crate::cache::{BookMap, IndexCache};
use crate::error::Result;
use crate::lookup::Lookup;
use crate::store::RecordStore;

/// A value paired with the wall-clock time spent producing it
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    /// Produced value
    pub value: T,
    /// Elapsed wall-clock time
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

fn timed<T>(f: impl FnOnce() -> Result<T>) -> Result<Timed<T>> {
    let start = Instant::now();
    let value = f()?;
    Ok(Timed {
        value,
        elapsed: start.elapsed(),
    })
}

/// A search algorithm that can be benchmarked against the others
pub trait SearchStrategy: Send + Sync {
    /// Stable key used in reports
    fn name(&self) -> &'static str;

    /// Human-readable label
    fn label(&self) -> &'static str;

    /// Find the record matching `lookup`, if any
    fn search(&self, lookup: &Lookup) -> Result<Timed<Option<Book>>>;
}

/// Full scan over an in-memory copy of the store
pub struct SequentialSearch<S> {
    store: Arc<S>,
}

impl<S> SequentialSearch<S> {
    /// Create a sequential strategy over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RecordStore> SearchStrategy for SequentialSearch<S> {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn label(&self) -> &'static str {
        "Sequential search"
    }

    fn search(&self, lookup: &Lookup) -> Result<Timed<Option<Book>>> {
        timed(|| {
            // The whole store is read even when the match is the first row
            let books = self.store.read_all()?;
            let scanned = books.len();
            let matches = lookup.matcher();
            let found = books.into_iter().find(|book| matches(book));
            trace!(scanned, hit = found.is_some(), "sequential search");
            Ok(found)
        })
    }
}

/// Point query answered by the store's own indexes
pub struct IndexedSearch<S> {
    store: Arc<S>,
}

impl<S> IndexedSearch<S> {
    /// Create an indexed strategy over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RecordStore> SearchStrategy for IndexedSearch<S> {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn label(&self) -> &'static str {
        "Indexed search"
    }

    fn search(&self, lookup: &Lookup) -> Result<Timed<Option<Book>>> {
        timed(|| {
            let found = match lookup {
                Lookup::ById(id) => self.store.find_by_id(*id)?,
                Lookup::ByTitle(title) => self.store.find_by_title_ci(title)?,
            };
            trace!(hit = found.is_some(), "indexed search");
            Ok(found)
        })
    }
}

/// Hash-map lookup through the index cache
///
/// A cold keyspace costs one full store read to build; warm lookups never
/// touch the store.
pub struct HashSearch<S> {
    store: Arc<S>,
    cache: Arc<IndexCache>,
}

impl<S> HashSearch<S> {
    /// Create a hash strategy over `store`, caching maps in `cache`
    pub fn new(store: Arc<S>, cache: Arc<IndexCache>) -> Self {
        Self { store, cache }
    }
}

impl<S: RecordStore> SearchStrategy for HashSearch<S> {
    fn name(&self) -> &'static str {
        "hashmap"
    }

    fn label(&self) -> &'static str {
        "HashMap search"
    }

    fn search(&self, lookup: &Lookup) -> Result<Timed<Option<Book>>> {
        timed(|| {
            let keyspace = lookup.keyspace();
            let map = self.cache.get_or_build(keyspace, || -> Result<BookMap> {
                Ok(keyspace.build(self.store.read_all()?))
            })?;
            let found = map.get(&lookup.cache_key()).cloned();
            trace!(%keyspace, hit = found.is_some(), "hash search");
            Ok(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Keyspace;
    use crate::testing::{book, CountingStore};

    fn catalog() -> Arc<CountingStore> {
        Arc::new(CountingStore::new(vec![
            book(1, "Dune", "Frank Herbert"),
            book(2, "Foundation", "Isaac Asimov"),
            book(3, "Emma", "Jane Austen"),
            book(4, "EMMA", "Other Author"),
        ]))
    }

    #[test]
    fn test_sequential_by_id() {
        let store = catalog();
        let strategy = SequentialSearch::new(Arc::clone(&store));

        let result = strategy.search(&Lookup::ById(2)).unwrap();
        assert_eq!(result.value.unwrap().title, "Foundation");
        assert_eq!(store.full_reads(), 1);
    }

    #[test]
    fn test_sequential_returns_first_match() {
        let strategy = SequentialSearch::new(catalog());

        let result = strategy.search(&Lookup::ByTitle("emma".into())).unwrap();
        assert_eq!(result.value.unwrap().id, 3);
    }

    #[test]
    fn test_sequential_miss_still_reads_store() {
        let store = catalog();
        let strategy = SequentialSearch::new(Arc::clone(&store));

        assert!(strategy.search(&Lookup::ById(99)).unwrap().value.is_none());
        assert_eq!(store.full_reads(), 1);
    }

    #[test]
    fn test_indexed_uses_point_queries() {
        let store = catalog();
        let strategy = IndexedSearch::new(Arc::clone(&store));

        let by_id = strategy.search(&Lookup::ById(1)).unwrap();
        let by_title = strategy.search(&Lookup::ByTitle("FOUNDATION".into())).unwrap();

        assert_eq!(by_id.value.unwrap().title, "Dune");
        assert_eq!(by_title.value.unwrap().id, 2);
        assert_eq!(store.full_reads(), 0);
        assert_eq!(store.point_reads(), 2);
    }

    #[test]
    fn test_hash_builds_once_then_hits() {
        let store = catalog();
        let cache = Arc::new(IndexCache::new());
        let strategy = HashSearch::new(Arc::clone(&store), Arc::clone(&cache));

        let first = strategy.search(&Lookup::ById(1)).unwrap();
        assert_eq!(store.full_reads(), 1);
        assert!(cache.is_built(Keyspace::ById));
        assert!(!cache.is_built(Keyspace::ByTitle));

        let second = strategy.search(&Lookup::ById(1)).unwrap();
        assert_eq!(store.full_reads(), 1);
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn test_hash_keyspaces_build_independently() {
        let store = catalog();
        let strategy = HashSearch::new(Arc::clone(&store), Arc::new(IndexCache::new()));

        strategy.search(&Lookup::ById(1)).unwrap();
        strategy.search(&Lookup::ByTitle("dune".into())).unwrap();
        strategy.search(&Lookup::ByTitle("emma".into())).unwrap();

        assert_eq!(store.full_reads(), 2);
    }

    #[test]
    fn test_hash_title_collision_keeps_last() {
        let strategy = HashSearch::new(catalog(), Arc::new(IndexCache::new()));

        let result = strategy.search(&Lookup::ByTitle("Emma".into())).unwrap();
        assert_eq!(result.value.unwrap().id, 4);
    }

    #[test]
    fn test_store_failure_is_surfaced() {
        let store = catalog();
        store.set_failing(true);
        let cache = Arc::new(IndexCache::new());

        let strategies: Vec<Box<dyn SearchStrategy>> = vec![
            Box::new(SequentialSearch::new(Arc::clone(&store))),
            Box::new(IndexedSearch::new(Arc::clone(&store))),
            Box::new(HashSearch::new(Arc::clone(&store), Arc::clone(&cache))),
        ];

        for strategy in &strategies {
            let err = strategy.search(&Lookup::ById(1)).unwrap_err();
            assert!(matches!(err, crate::SearchError::StoreUnavailable(_)));
        }
        assert!(!cache.is_built(Keyspace::ById));
    }

    #[test]
    fn test_elapsed_ms() {
        let timed = Timed {
            value: (),
            elapsed: Duration::from_micros(1500),
        };
        assert!((timed.elapsed_ms() - 1.5).abs() < 1e-9);
    }
}
