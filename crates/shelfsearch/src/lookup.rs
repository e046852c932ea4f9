//! Query classification

use shelfdb::{fold_title, Book};

use crate::cache::Keyspace;

/// A classified search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Term made only of digits
    ById(u64),
    /// Any other non-empty term, compared case-insensitively
    ByTitle(String),
}

impl Lookup {
    /// Classify a raw search term.
    ///
    /// Returns `None` for empty or whitespace-only terms. Digit strings too
    /// large for a `u64` become `ById(u64::MAX)`, an id the store never
    /// assigns.
    pub fn classify(term: &str) -> Option<Lookup> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }

        if term.bytes().all(|b| b.is_ascii_digit()) {
            let id = term.parse::<u64>().unwrap_or(u64::MAX);
            return Some(Lookup::ById(id));
        }

        Some(Lookup::ByTitle(term.to_string()))
    }

    /// Predicate for records satisfying this lookup.
    ///
    /// A title term is folded once here, not per record.
    pub fn matcher(&self) -> impl Fn(&Book) -> bool {
        let lookup = match self {
            Lookup::ById(id) => Lookup::ById(*id),
            Lookup::ByTitle(title) => Lookup::ByTitle(fold_title(title)),
        };

        move |book| match &lookup {
            Lookup::ById(id) => book.id == *id,
            Lookup::ByTitle(folded) => book.folded_title() == *folded,
        }
    }

    /// Index cache partition serving this lookup
    pub fn keyspace(&self) -> Keyspace {
        match self {
            Lookup::ById(_) => Keyspace::ById,
            Lookup::ByTitle(_) => Keyspace::ByTitle,
        }
    }

    /// Key under which the index cache stores a match
    pub fn cache_key(&self) -> String {
        match self {
            Lookup::ById(id) => id.to_string(),
            Lookup::ByTitle(title) => fold_title(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_digits_as_id() {
        assert_eq!(Lookup::classify("42"), Some(Lookup::ById(42)));
        assert_eq!(Lookup::classify("  007 "), Some(Lookup::ById(7)));
    }

    #[test]
    fn test_classify_text_as_title() {
        assert_eq!(
            Lookup::classify(" Dune "),
            Some(Lookup::ByTitle("Dune".to_string()))
        );
        assert_eq!(
            Lookup::classify("1984a"),
            Some(Lookup::ByTitle("1984a".to_string()))
        );
        assert_eq!(
            Lookup::classify("-1"),
            Some(Lookup::ByTitle("-1".to_string()))
        );
    }

    #[test]
    fn test_classify_empty() {
        assert_eq!(Lookup::classify(""), None);
        assert_eq!(Lookup::classify(" \t\n"), None);
    }

    #[test]
    fn test_classify_overflowing_id() {
        assert_eq!(
            Lookup::classify("99999999999999999999999"),
            Some(Lookup::ById(u64::MAX))
        );
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(Lookup::ById(12).cache_key(), "12");
        assert_eq!(Lookup::ByTitle("The Hobbit".into()).cache_key(), "the hobbit");
        assert_eq!(Lookup::ById(1).keyspace(), Keyspace::ById);
        assert_eq!(Lookup::ByTitle("x".into()).keyspace(), Keyspace::ByTitle);
    }

    #[test]
    fn test_matcher() {
        let book = Book {
            id: 3,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: None,
        };

        assert!(Lookup::ById(3).matcher()(&book));
        assert!(!Lookup::ById(4).matcher()(&book));
        assert!(Lookup::ByTitle("dUNE".into()).matcher()(&book));
        assert!(!Lookup::ByTitle("Dun".into()).matcher()(&book));
    }
}
