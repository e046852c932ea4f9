//! Storage engine implementation
//!
//! File layout:
//! - `books.toon`: Data file with TOON header + record lines
//! - `books.toon.idx`: Index file mapping row numbers to offsets
//!
//! A book's id is its row number plus one. Besides the offset index, the
//! store keeps a case-folded title index in memory, rebuilt on open.
//!
//! Every insert appends the record line to the data file, then its offset to
//! the index file, then bumps the index count. On open, complete lines past
//! the last indexed row are re-indexed and a torn trailing line is truncated,
//! so an unclean shutdown never leaves rows the index does not describe.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::book::{fold_title, Book, NewBook};
use crate::error::{Error, Result};
use crate::parser::{
    create_header, decode_record, encode_record, parse_header, parse_index_header, parse_line,
    HEADER_LEN, TOON_IDX_MAGIC, TOON_MAGIC, TOON_VERSION,
};

/// Maximum encoded record size (1 MB)
const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Maximum store size (1 GB)
const MAX_DB_SIZE: u64 = 1024 * 1024 * 1024;

const DATA_FILE: &str = "books.toon";
const IDX_FILE: &str = "books.toon.idx";

/// Byte length of the index file header (magic + count)
const IDX_HEADER_LEN: u64 = 12;

/// In-memory indexes and bookkeeping, guarded by one lock
struct StoreState {
    /// row -> offset in data file
    offsets: Vec<u64>,

    /// folded title -> id of the first book inserted with that title
    titles: HashMap<String, u64>,

    /// Current data file size
    db_size: u64,

    closed: bool,
}

/// BookStore is the record store handle
///
/// Lock order is always `state`, then `data_file`, then `idx_file`.
pub struct BookStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    data_file: Mutex<File>,
    idx_file: Mutex<File>,
}

impl BookStore {
    /// Open or create a store in the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let data_path = path.join(DATA_FILE);
        let idx_path = path.join(IDX_FILE);

        let (mut data_file, idx_file, offsets, db_size) = if data_path.exists() {
            Self::open_existing(&data_path, &idx_path)?
        } else {
            Self::create_new(&data_path, &idx_path)?
        };

        let titles = Self::load_titles(&mut data_file, &offsets, db_size)?;
        info!(path = %path.display(), rows = offsets.len(), "book store opened");

        Ok(BookStore {
            path: path.to_path_buf(),
            state: RwLock::new(StoreState {
                offsets,
                titles,
                db_size,
                closed: false,
            }),
            data_file: Mutex::new(data_file),
            idx_file: Mutex::new(idx_file),
        })
    }

    fn open_existing(data_path: &Path, idx_path: &Path) -> Result<(File, File, Vec<u64>, u64)> {
        let mut data_file = OpenOptions::new().read(true).write(true).open(data_path)?;
        let mut idx_file = OpenOptions::new().read(true).write(true).open(idx_path)?;

        let mut header_buf = [0u8; HEADER_LEN];
        data_file.read_exact(&mut header_buf)?;
        let header = parse_header(&header_buf)?;
        if header.version != TOON_VERSION {
            return Err(Error::Parse(format!(
                "Unsupported TOON version: {}",
                header.version
            )));
        }

        let mut idx_header = [0u8; IDX_HEADER_LEN as usize];
        idx_file.read_exact(&mut idx_header)?;
        let count = parse_index_header(&idx_header)?;

        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut offset_buf = [0u8; 8];
            idx_file.read_exact(&mut offset_buf)?;
            offsets.push(u64::from_le_bytes(offset_buf));
        }

        let db_size = Self::recover_tail(&mut data_file, &mut idx_file, &mut offsets)?;

        Ok((data_file, idx_file, offsets, db_size))
    }

    /// Re-index complete rows written after the last indexed one and drop a
    /// torn trailing line. Returns the valid data file size.
    fn recover_tail(data_file: &mut File, idx_file: &mut File, offsets: &mut Vec<u64>) -> Result<u64> {
        let file_len = data_file.seek(SeekFrom::End(0))?;
        let start = offsets.last().copied().unwrap_or(HEADER_LEN as u64);
        if start > file_len {
            return Err(Error::Parse(format!(
                "Index points past end of data file ({} > {})",
                start, file_len
            )));
        }

        data_file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((file_len - start) as usize);
        data_file.read_to_end(&mut buf)?;

        let mut input = &buf[..];
        if !offsets.is_empty() {
            let (rest, _) = parse_line(input)?;
            input = rest;
        }

        let indexed = offsets.len();
        loop {
            let offset = file_len - input.len() as u64;
            let Ok((rest, line)) = parse_line(input) else {
                break;
            };
            match decode_record(line) {
                Ok(book) if book.id == offsets.len() as u64 + 1 => {
                    offsets.push(offset);
                    input = rest;
                }
                _ => break,
            }
        }

        for (row, &offset) in offsets.iter().enumerate().skip(indexed) {
            Self::write_index_entry(idx_file, row, offset)?;
        }
        if offsets.len() > indexed {
            warn!(rows = offsets.len() - indexed, "re-indexed rows missing from index file");
        }

        let valid_len = file_len - input.len() as u64;
        if valid_len < file_len {
            warn!(bytes = file_len - valid_len, "truncating torn record at end of data file");
            data_file.set_len(valid_len)?;
        }
        Ok(valid_len)
    }

    /// Write the offset of `row`, then publish it through the index count
    fn write_index_entry(idx_file: &mut File, row: usize, offset: u64) -> Result<()> {
        idx_file.seek(SeekFrom::Start(IDX_HEADER_LEN + row as u64 * 8))?;
        idx_file.write_all(&offset.to_le_bytes())?;
        idx_file.seek(SeekFrom::Start(TOON_IDX_MAGIC.len() as u64))?;
        idx_file.write_all(&(row as u32 + 1).to_le_bytes())?;
        Ok(())
    }

    fn create_new(data_path: &Path, idx_path: &Path) -> Result<(File, File, Vec<u64>, u64)> {
        let mut data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(data_path)?;

        let mut idx_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(idx_path)?;

        let header = create_header(TOON_VERSION, 0);
        data_file.write_all(&header)?;

        idx_file.write_all(TOON_IDX_MAGIC)?;
        idx_file.write_all(&0u32.to_le_bytes())?;

        Ok((data_file, idx_file, Vec::new(), header.len() as u64))
    }

    fn load_titles(data_file: &mut File, offsets: &[u64], db_size: u64) -> Result<HashMap<String, u64>> {
        let mut titles = HashMap::with_capacity(offsets.len());
        for book in Self::read_rows(data_file, offsets, db_size)? {
            titles.entry(book.folded_title()).or_insert(book.id);
        }
        Ok(titles)
    }

    /// Read every row in the offset index, in id order
    ///
    /// Each row is decoded from its own offset up to the next one.
    fn read_rows(data_file: &mut File, offsets: &[u64], db_size: u64) -> Result<Vec<Book>> {
        let Some(&start) = offsets.first() else {
            return Ok(Vec::new());
        };

        data_file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (db_size - start) as usize];
        data_file.read_exact(&mut buf)?;

        let mut books = Vec::with_capacity(offsets.len());
        for (row, &offset) in offsets.iter().enumerate() {
            let end = offsets.get(row + 1).copied().unwrap_or(db_size);
            let line = &buf[(offset - start) as usize..(end - start) as usize];
            let (_, line) = parse_line(line)?;
            books.push(decode_record(line)?);
        }
        Ok(books)
    }

    /// Insert a new book, assigning the next id
    pub fn insert(&self, new_book: NewBook) -> Result<Book> {
        let new_book = new_book.normalize()?;

        let mut state = self.state.write();
        if state.closed {
            return Err(Error::Closed);
        }

        let book = new_book.into_book(state.offsets.len() as u64 + 1);
        let mut line = encode_record(&book);

        if line.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge(line.len()));
        }
        if state.db_size + line.len() as u64 + 1 > MAX_DB_SIZE {
            return Err(Error::DatabaseFull(state.db_size));
        }
        line.push(b'\n');

        // Overwrites any leftovers of an earlier failed write
        let mut data_file = self.data_file.lock();
        let offset = data_file.seek(SeekFrom::Start(state.db_size))?;
        data_file.write_all(&line)?;

        let mut idx_file = self.idx_file.lock();
        Self::write_index_entry(&mut idx_file, state.offsets.len(), offset)?;

        state.offsets.push(offset);
        state.titles.entry(book.folded_title()).or_insert(book.id);
        state.db_size = offset + line.len() as u64;

        debug!(id = book.id, title = %book.title, "book inserted");
        Ok(book)
    }

    /// Read every book in store order
    pub fn read_all(&self) -> Result<Vec<Book>> {
        let state = self.state.read();
        if state.closed {
            return Err(Error::Closed);
        }

        let mut data_file = self.data_file.lock();
        Self::read_rows(&mut data_file, &state.offsets, state.db_size)
    }

    /// Point lookup through the offset index
    pub fn find_by_id(&self, id: u64) -> Result<Option<Book>> {
        let state = self.state.read();
        if state.closed {
            return Err(Error::Closed);
        }
        self.read_book(&state, id)
    }

    /// Case-insensitive title lookup through the title index
    ///
    /// With duplicate titles the first inserted book is returned.
    pub fn find_by_title_ci(&self, title: &str) -> Result<Option<Book>> {
        let state = self.state.read();
        if state.closed {
            return Err(Error::Closed);
        }

        match state.titles.get(&fold_title(title)) {
            Some(&id) => self.read_book(&state, id),
            None => Ok(None),
        }
    }

    /// Fetch a book by id, failing with `NotFound` when absent
    pub fn get(&self, id: u64) -> Result<Book> {
        self.find_by_id(id)?.ok_or(Error::NotFound)
    }

    fn read_book(&self, state: &StoreState, id: u64) -> Result<Option<Book>> {
        if id == 0 || id > state.offsets.len() as u64 {
            return Ok(None);
        }

        let row = (id - 1) as usize;
        let offset = state.offsets[row];
        let next_offset = state
            .offsets
            .get(row + 1)
            .copied()
            .unwrap_or(state.db_size);

        let mut data_file = self.data_file.lock();
        data_file.seek(SeekFrom::Start(offset))?;

        let line_len = (next_offset - offset - 1) as usize; // -1 for newline
        let mut line = vec![0u8; line_len];
        data_file.read_exact(&mut line)?;

        decode_record(&line).map(Some)
    }

    /// Get the number of books in the store
    pub fn len(&self) -> usize {
        self.state.read().offsets.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.state.read().offsets.is_empty()
    }

    /// Close the store and fsync all changes
    pub fn close(&mut self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }

        let row_count = state.offsets.len() as u32;

        let mut data_file = self.data_file.lock();
        data_file.seek(SeekFrom::Start(TOON_MAGIC.len() as u64 + 4))?;
        data_file.write_all(&row_count.to_le_bytes())?;
        data_file.sync_all()?;

        // Offsets and count are already current; just flush them
        self.idx_file.lock().sync_all()?;

        state.closed = true;
        info!(path = %self.path.display(), rows = row_count, "book store closed");

        Ok(())
    }
}

impl Drop for BookStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
