//! Book records and insert validation

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum author length in characters
pub const MAX_AUTHOR_LEN: usize = 200;

/// Placeholder shown for books stored without a description
pub const NO_DESCRIPTION: &str = "No description";

/// A stored book record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned id, starting at 1
    pub id: u64,
    /// Title as entered
    pub title: String,
    /// Author as entered
    pub author: String,
    /// Optional free-form description
    pub description: Option<String>,
}

impl Book {
    /// Description text, or a placeholder when none was stored
    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or(NO_DESCRIPTION)
    }

    /// Case-folded title, the key used by title lookups
    pub fn folded_title(&self) -> String {
        fold_title(&self.title)
    }
}

/// Case-fold a title for case-insensitive comparison
pub fn fold_title(title: &str) -> String {
    title.to_lowercase()
}

/// Insert payload for a new book; the id is assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewBook {
    /// Title (required)
    pub title: String,
    /// Author (required)
    pub author: String,
    /// Description (optional, empty means none)
    pub description: Option<String>,
}

impl NewBook {
    /// Create an insert payload
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            description,
        }
    }

    /// Trim every field and check the required ones.
    ///
    /// An empty description becomes `None`.
    pub fn normalize(self) -> Result<NewBook> {
        let title = self.title.trim().to_string();
        let author = self.author.trim().to_string();
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if title.is_empty() {
            return Err(Error::MissingField("title"));
        }
        if author.is_empty() {
            return Err(Error::MissingField("author"));
        }
        check_len("title", &title, MAX_TITLE_LEN)?;
        check_len("author", &author, MAX_AUTHOR_LEN)?;

        Ok(NewBook {
            title,
            author,
            description,
        })
    }

    /// Attach a store-assigned id
    pub(crate) fn into_book(self, id: u64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            description: self.description,
        }
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::FieldTooLong { field, len, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_fields() {
        let book = NewBook::new("  Dune ", " Frank Herbert", Some("  ".to_string()))
            .normalize()
            .unwrap();

        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.description, None);
    }

    #[test]
    fn test_normalize_requires_title_and_author() {
        let result = NewBook::new("   ", "Herbert", None).normalize();
        assert!(matches!(result, Err(Error::MissingField("title"))));

        let result = NewBook::new("Dune", "", None).normalize();
        assert!(matches!(result, Err(Error::MissingField("author"))));
    }

    #[test]
    fn test_normalize_rejects_long_title() {
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        let result = NewBook::new(long, "Herbert", None).normalize();
        assert!(matches!(
            result,
            Err(Error::FieldTooLong { field: "title", len: 201, max: 200 })
        ));
    }

    #[test]
    fn test_length_counts_characters() {
        // 200 multi-byte characters are still within the limit
        let title = "é".repeat(MAX_TITLE_LEN);
        assert!(NewBook::new(title, "Autor", None).normalize().is_ok());
    }

    #[test]
    fn test_description_placeholder() {
        let book = NewBook::new("Dune", "Herbert", None).into_book(1);
        assert_eq!(book.description_or_default(), NO_DESCRIPTION);
        assert_eq!(book.folded_title(), "dune");
    }
}
