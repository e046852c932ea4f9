//! Read interface the strategies consume from a record store

use shelfdb::{Book, BookStore};

/// Reads a search strategy may issue against a record store
pub trait RecordStore: Send + Sync {
    /// Every record, in store order
    fn read_all(&self) -> shelfdb::Result<Vec<Book>>;

    /// Point lookup by id
    fn find_by_id(&self, id: u64) -> shelfdb::Result<Option<Book>>;

    /// Point lookup by case-insensitive title, at most one record
    fn find_by_title_ci(&self, title: &str) -> shelfdb::Result<Option<Book>>;
}

impl RecordStore for BookStore {
    fn read_all(&self) -> shelfdb::Result<Vec<Book>> {
        BookStore::read_all(self)
    }

    fn find_by_id(&self, id: u64) -> shelfdb::Result<Option<Book>> {
        BookStore::find_by_id(self, id)
    }

    fn find_by_title_ci(&self, title: &str) -> shelfdb::Result<Option<Book>> {
        BookStore::find_by_title_ci(self, title)
    }
}
