//! # shelfsearch
//!
//! Side-by-side comparison of three ways to find a book:
//!
//! - **Sequential**: read the whole store, scan in order
//! - **Indexed**: point query against the store's own indexes
//! - **HashMap**: lookup in a lazily built [`IndexCache`] map
//!
//! [`SearchBench`] classifies a term as an id or title lookup, runs all three
//! strategies in that order and reports each result with its elapsed time.
//! The hash strategy pays one full store read to build a keyspace and is
//! free afterwards, until [`SearchBench::invalidate_cache`] is called.

#![warn(missing_docs)]

mod bench;
mod cache;
mod error;
mod lookup;
mod stats;
mod store;
mod strategy;

#[cfg(test)]
mod testing;

pub use bench::{SearchBench, SearchReport, StrategyOutcome};
pub use cache::{BookMap, IndexCache, Keyspace};
pub use error::{Result, SearchError};
pub use lookup::Lookup;
pub use stats::{CacheStats, KeyspaceStats};
pub use store::RecordStore;
pub use strategy::{HashSearch, IndexedSearch, SearchStrategy, SequentialSearch, Timed};
