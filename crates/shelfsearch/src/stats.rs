//! Per-keyspace index cache counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::Keyspace;

#[derive(Debug, Default)]
struct KeyspaceCounters {
    hits: AtomicU64,
    builds: AtomicU64,
    failed_builds: AtomicU64,
    build_micros: AtomicU64,
}

impl KeyspaceCounters {
    fn snapshot(&self) -> KeyspaceStats {
        KeyspaceStats {
            hits: self.hits.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            failed_builds: self.failed_builds.load(Ordering::Relaxed),
            build_time: Duration::from_micros(self.build_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time counters for one keyspace
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyspaceStats {
    /// Lookups served by an already built map
    pub hits: u64,
    /// Maps built after a miss
    pub builds: u64,
    /// Misses whose store read failed
    pub failed_builds: u64,
    /// Total time spent building maps
    pub build_time: Duration,
}

impl KeyspaceStats {
    /// Share of lookups that found the map already built (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.builds + self.failed_builds;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Index cache activity, split by keyspace
#[derive(Debug, Default)]
pub struct CacheStats {
    by_id: KeyspaceCounters,
    by_title: KeyspaceCounters,
    invalidations: AtomicU64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, keyspace: Keyspace) -> &KeyspaceCounters {
        match keyspace {
            Keyspace::ById => &self.by_id,
            Keyspace::ByTitle => &self.by_title,
        }
    }

    pub(crate) fn record_hit(&self, keyspace: Keyspace) {
        self.counters(keyspace).hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build(&self, keyspace: Keyspace, elapsed: Duration) {
        let counters = self.counters(keyspace);
        counters.builds.fetch_add(1, Ordering::Relaxed);
        counters
            .build_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_build(&self, keyspace: Keyspace) {
        self.counters(keyspace)
            .failed_builds
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters for one keyspace
    pub fn keyspace(&self, keyspace: Keyspace) -> KeyspaceStats {
        self.counters(keyspace).snapshot()
    }

    /// Times both maps were dropped
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}
