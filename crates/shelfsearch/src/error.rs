//! Error types for search strategies

use std::fmt;

/// Result type alias for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors surfaced by a single strategy run
#[derive(Debug)]
pub enum SearchError {
    /// The record store failed to answer a read
    StoreUnavailable(shelfdb::Error),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::StoreUnavailable(e) => write!(f, "Record store unavailable: {}", e),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::StoreUnavailable(e) => Some(e),
        }
    }
}

impl From<shelfdb::Error> for SearchError {
    fn from(err: shelfdb::Error) -> Self {
        SearchError::StoreUnavailable(err)
    }
}
