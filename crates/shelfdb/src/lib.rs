//! # shelfdb
//!
//! Embedded book record store using the TOON (Token-Oriented Object Notation)
//! file layout.
//!
//! - Single writer, many readers
//! - Append-only data file with an offset index
//! - Store-assigned ids, point lookups by id and case-insensitive title
//! - 1 MB max record, 1 GB max store size

#![warn(missing_docs)]

mod book;
mod error;
mod parser;
mod storage;

pub use book::{fold_title, Book, NewBook, MAX_AUTHOR_LEN, MAX_TITLE_LEN, NO_DESCRIPTION};
pub use error::{Error, Result};
pub use storage::BookStore;
