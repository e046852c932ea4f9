//! Benchmark orchestrator: run every strategy for one term and compare

use std::sync::Arc;
use std::time::Duration;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use shelfdb::Book;
use tracing::{debug, warn};

use crate::cache::IndexCache;
use crate::error::{Result, SearchError};
use crate::lookup::Lookup;
use crate::store::RecordStore;
use crate::strategy::{HashSearch, IndexedSearch, SearchStrategy, SequentialSearch, Timed};

/// One strategy's contribution to a report
#[derive(Debug)]
pub struct StrategyOutcome {
    /// Strategy key, e.g. `"sequential"`
    pub name: &'static str,
    /// Human-readable label
    pub label: &'static str,
    /// Matched record and timing, or the store failure that aborted the run
    pub result: Result<Timed<Option<Book>>>,
}

impl StrategyOutcome {
    /// Matched record, if the run succeeded and found one
    pub fn book(&self) -> Option<&Book> {
        self.result.as_ref().ok().and_then(|t| t.value.as_ref())
    }

    /// Elapsed time of a successful run
    pub fn elapsed(&self) -> Option<Duration> {
        self.result.as_ref().ok().map(|t| t.elapsed)
    }

    /// Failure that aborted the run
    pub fn error(&self) -> Option<&SearchError> {
        self.result.as_ref().err()
    }
}

/// Comparative results of one search, in strategy order
#[derive(Debug)]
pub struct SearchReport {
    term: String,
    lookup: Option<Lookup>,
    outcomes: Vec<StrategyOutcome>,
}

impl SearchReport {
    /// Trimmed term the report answers
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Classified lookup, `None` for an empty term
    pub fn lookup(&self) -> Option<&Lookup> {
        self.lookup.as_ref()
    }

    /// Outcome for a strategy by name
    pub fn get(&self, name: &str) -> Option<&StrategyOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Outcomes in the order the strategies ran
    pub fn iter(&self) -> impl Iterator<Item = &StrategyOutcome> {
        self.outcomes.iter()
    }

    /// True when no strategy ran (empty term)
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of strategies that ran
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

#[derive(Serialize)]
struct OutcomeView<'a> {
    label: &'a str,
    result: Option<&'a Book>,
    elapsed_ms: Option<f64>,
    error: Option<String>,
}

struct OutcomeMap<'a>(&'a [StrategyOutcome]);

impl Serialize for OutcomeMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for outcome in self.0 {
            let view = OutcomeView {
                label: outcome.label,
                result: outcome.book(),
                // four decimal places, matching the text output
                elapsed_ms: outcome
                    .elapsed()
                    .map(|d| (d.as_secs_f64() * 10_000_000.0).round() / 10_000.0),
                error: outcome.error().map(|e| e.to_string()),
            };
            map.serialize_entry(outcome.name, &view)?;
        }
        map.end()
    }
}

impl Serialize for SearchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let kind = match &self.lookup {
            Some(Lookup::ById(_)) => Some("id"),
            Some(Lookup::ByTitle(_)) => Some("title"),
            None => None,
        };

        let mut report = serializer.serialize_struct("SearchReport", 3)?;
        report.serialize_field("term", &self.term)?;
        report.serialize_field("lookup", &kind)?;
        report.serialize_field("results", &OutcomeMap(&self.outcomes))?;
        report.end()
    }
}

/// Runs sequential, indexed and hash search side by side
///
/// The index cache is injected so callers decide its lifetime: one per
/// process for the daemon, one per fixture in tests.
pub struct SearchBench {
    cache: Arc<IndexCache>,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl SearchBench {
    /// Create an orchestrator over `store`, caching hash maps in `cache`
    pub fn new<S: RecordStore + 'static>(store: Arc<S>, cache: Arc<IndexCache>) -> Self {
        let strategies: Vec<Box<dyn SearchStrategy>> = vec![
            Box::new(SequentialSearch::new(Arc::clone(&store))),
            Box::new(IndexedSearch::new(Arc::clone(&store))),
            Box::new(HashSearch::new(store, Arc::clone(&cache))),
        ];

        Self { cache, strategies }
    }

    /// Classify `term` and run every strategy in order.
    ///
    /// An empty or whitespace-only term yields an empty report. A store
    /// failure only voids the strategy that hit it.
    pub fn search(&self, term: &str) -> SearchReport {
        let term = term.trim();
        let Some(lookup) = Lookup::classify(term) else {
            return SearchReport {
                term: term.to_string(),
                lookup: None,
                outcomes: Vec::new(),
            };
        };

        let outcomes = self
            .strategies
            .iter()
            .map(|strategy| {
                let result = strategy.search(&lookup);
                match &result {
                    Ok(timed) => debug!(
                        strategy = strategy.name(),
                        hit = timed.value.is_some(),
                        elapsed_ms = timed.elapsed_ms(),
                        "strategy finished"
                    ),
                    Err(e) => warn!(strategy = strategy.name(), error = %e, "strategy failed"),
                }
                StrategyOutcome {
                    name: strategy.name(),
                    label: strategy.label(),
                    result,
                }
            })
            .collect();

        SearchReport {
            term: term.to_string(),
            lookup: Some(lookup),
            outcomes,
        }
    }

    /// Clear the hash strategy's index cache
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Index cache shared with the hash strategy
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Strategy names in execution order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}
