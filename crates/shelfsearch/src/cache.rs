//! Index cache: lazily built lookup maps over a store snapshot
//!
//! Each keyspace holds an immutable map behind an `Arc`. A map is built in
//! one pass over `read_all()` and is never patched afterwards; the only way to
//! refresh it is to invalidate and rebuild.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use parking_lot::RwLock;
use shelfdb::Book;
use tracing::debug;

use crate::stats::CacheStats;

/// Lookup key -> record map for one keyspace
pub type BookMap = HashMap<String, Book, RandomState>;

/// Index cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// Keyed by the decimal string of the id
    ById,
    /// Keyed by the case-folded title
    ByTitle,
}

impl Keyspace {
    /// Build this keyspace's map from a full store read.
    ///
    /// Title collisions keep the last record in iteration order. Records with
    /// an empty title are not indexed by title.
    pub fn build(self, books: Vec<Book>) -> BookMap {
        let mut map = BookMap::with_capacity_and_hasher(books.len(), RandomState::new());
        for book in books {
            match self {
                Keyspace::ById => {
                    map.insert(book.id.to_string(), book);
                }
                Keyspace::ByTitle => {
                    if book.title.is_empty() {
                        continue;
                    }
                    map.insert(book.folded_title(), book);
                }
            }
        }
        map
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyspace::ById => write!(f, "by_id"),
            Keyspace::ByTitle => write!(f, "by_title"),
        }
    }
}

/// Process-wide (or fixture-scoped) cache of keyspace maps
///
/// Builds are not serialized: two callers that both miss will both build,
/// and the later `set` wins. Maps are pure functions of store state, so the
/// outcome is redundant work, never a torn map.
#[derive(Default)]
pub struct IndexCache {
    by_id: RwLock<Option<Arc<BookMap>>>,
    by_title: RwLock<Option<Arc<BookMap>>>,
    stats: CacheStats,
}

impl IndexCache {
    /// Create an empty cache; both keyspaces start absent
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, keyspace: Keyspace) -> &RwLock<Option<Arc<BookMap>>> {
        match keyspace {
            Keyspace::ById => &self.by_id,
            Keyspace::ByTitle => &self.by_title,
        }
    }

    /// Current map for a keyspace, or `None` if not built
    pub fn get(&self, keyspace: Keyspace) -> Option<Arc<BookMap>> {
        self.slot(keyspace).read().clone()
    }

    /// Replace the map for a keyspace
    pub fn set(&self, keyspace: Keyspace, map: BookMap) -> Arc<BookMap> {
        let map = Arc::new(map);
        *self.slot(keyspace).write() = Some(Arc::clone(&map));
        map
    }

    /// Return the keyspace's map, building and storing it on a miss
    pub fn get_or_build<E, F>(&self, keyspace: Keyspace, build: F) -> Result<Arc<BookMap>, E>
    where
        F: FnOnce() -> Result<BookMap, E>,
    {
        if let Some(map) = self.get(keyspace) {
            self.stats.record_hit(keyspace);
            return Ok(map);
        }

        let start = Instant::now();
        let map = match build() {
            Ok(map) => map,
            Err(e) => {
                self.stats.record_failed_build(keyspace);
                return Err(e);
            }
        };
        self.stats.record_build(keyspace, start.elapsed());
        debug!(%keyspace, entries = map.len(), "index cache built");

        Ok(self.set(keyspace, map))
    }

    /// Drop both maps; the next lookup rebuilds from the store
    pub fn invalidate(&self) {
        *self.by_id.write() = None;
        *self.by_title.write() = None;
        self.stats.record_invalidation();
        debug!("index cache invalidated");
    }

    /// Whether a keyspace currently holds a map
    pub fn is_built(&self, keyspace: Keyspace) -> bool {
        self.slot(keyspace).read().is_some()
    }

    /// Entry count of a keyspace's map, if built
    pub fn len(&self, keyspace: Keyspace) -> Option<usize> {
        self.slot(keyspace).read().as_ref().map(|map| map.len())
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: u64, title: &str) -> Book {
        Book {
            id,
            title: title.to_string(),
            author: "Author".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_starts_absent() {
        let cache = IndexCache::new();

        assert!(cache.get(Keyspace::ById).is_none());
        assert!(cache.get(Keyspace::ByTitle).is_none());
        assert_eq!(cache.len(Keyspace::ById), None);
    }

    #[test]
    fn test_set_and_get() {
        let cache = IndexCache::new();
        cache.set(Keyspace::ById, Keyspace::ById.build(vec![book(1, "Dune")]));

        let map = cache.get(Keyspace::ById).unwrap();
        assert_eq!(map.get("1").unwrap().title, "Dune");
        assert!(!cache.is_built(Keyspace::ByTitle));
    }

    #[test]
    fn test_build_title_map_folds_and_skips_empty() {
        let map = Keyspace::ByTitle.build(vec![book(1, "Dune"), book(2, "")]);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("dune").unwrap().id, 1);
    }

    #[test]
    fn test_build_title_map_last_write_wins() {
        let map = Keyspace::ByTitle.build(vec![book(1, "Emma"), book(2, "EMMA")]);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("emma").unwrap().id, 2);
    }

    #[test]
    fn test_get_or_build_builds_once() {
        let cache = IndexCache::new();
        let mut builds = 0;

        for _ in 0..3 {
            let map = cache
                .get_or_build(Keyspace::ById, || {
                    builds += 1;
                    Ok::<_, ()>(Keyspace::ById.build(vec![book(1, "Dune")]))
                })
                .unwrap();
            assert_eq!(map.len(), 1);
        }

        assert_eq!(builds, 1);
        let stats = cache.stats().keyspace(Keyspace::ById);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.builds, 1);
        assert_eq!(cache.stats().keyspace(Keyspace::ByTitle).builds, 0);
    }

    #[test]
    fn test_get_or_build_error_leaves_absent() {
        let cache = IndexCache::new();

        let result = cache.get_or_build(Keyspace::ByTitle, || Err("store down"));
        assert_eq!(result.unwrap_err(), "store down");
        assert!(!cache.is_built(Keyspace::ByTitle));
        let stats = cache.stats().keyspace(Keyspace::ByTitle);
        assert_eq!(stats.builds, 0);
        assert_eq!(stats.failed_builds, 1);
    }

    #[test]
    fn test_invalidate_clears_both() {
        let cache = IndexCache::new();
        cache.set(Keyspace::ById, BookMap::default());
        cache.set(Keyspace::ByTitle, BookMap::default());

        cache.invalidate();
        assert!(!cache.is_built(Keyspace::ById));
        assert!(!cache.is_built(Keyspace::ByTitle));

        // Idempotent
        cache.invalidate();
        assert!(!cache.is_built(Keyspace::ById));
        assert_eq!(cache.stats().invalidations(), 2);
    }

    #[test]
    fn test_outstanding_map_survives_invalidation() {
        let cache = IndexCache::new();
        let map = cache.set(Keyspace::ById, Keyspace::ById.build(vec![book(1, "Dune")]));

        cache.invalidate();

        // Readers holding the old snapshot keep a consistent view
        assert_eq!(map.get("1").unwrap().title, "Dune");
        assert!(cache.get(Keyspace::ById).is_none());
    }
}
