//! In-memory record store that counts reads, for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use shelfdb::{fold_title, Book};

use crate::store::RecordStore;

pub(crate) fn book(id: u64, title: &str, author: &str) -> Book {
    Book {
        id,
        title: title.to_string(),
        author: author.to_string(),
        description: None,
    }
}

pub(crate) struct CountingStore {
    books: RwLock<Vec<Book>>,
    full_reads: AtomicUsize,
    point_reads: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub(crate) fn new(books: Vec<Book>) -> Self {
        Self {
            books: RwLock::new(books),
            full_reads: AtomicUsize::new(0),
            point_reads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, book: Book) {
        self.books.write().push(book);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn point_reads(&self) -> usize {
        self.point_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> shelfdb::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(shelfdb::Error::Closed);
        }
        Ok(())
    }
}

impl RecordStore for CountingStore {
    fn read_all(&self) -> shelfdb::Result<Vec<Book>> {
        self.check()?;
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.books.read().clone())
    }

    fn find_by_id(&self, id: u64) -> shelfdb::Result<Option<Book>> {
        self.check()?;
        self.point_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.books.read().iter().find(|b| b.id == id).cloned())
    }

    fn find_by_title_ci(&self, title: &str) -> shelfdb::Result<Option<Book>> {
        self.check()?;
        self.point_reads.fetch_add(1, Ordering::SeqCst);
        let folded = fold_title(title);
        Ok(self
            .books
            .read()
            .iter()
            .find(|b| b.folded_title() == folded)
            .cloned())
    }
}
