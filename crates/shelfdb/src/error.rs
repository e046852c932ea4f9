//! Error types for shelfdb

use std::fmt;
use std::io;

/// Result type alias for shelfdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for record store operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Parse error in the data or index file
    Parse(String),

    /// Encoded record too large (max 1 MB)
    ValueTooLarge(usize),

    /// Store full (max 1 GB)
    DatabaseFull(u64),

    /// Record not found
    NotFound,

    /// Store is closed
    Closed,

    /// A required field was empty after trimming
    MissingField(&'static str),

    /// A field exceeded its maximum length in characters
    FieldTooLong {
        /// Field name
        field: &'static str,
        /// Actual length in characters
        len: usize,
        /// Allowed length in characters
        max: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::ValueTooLarge(size) => write!(f, "Record too large: {} bytes (max 1 MB)", size),
            Error::DatabaseFull(size) => write!(f, "Store full: {} bytes (max 1 GB)", size),
            Error::NotFound => write!(f, "Record not found"),
            Error::Closed => write!(f, "Store is closed"),
            Error::MissingField(field) => write!(f, "Field '{}' is required", field),
            Error::FieldTooLong { field, len, max } => {
                write!(f, "Field '{}' too long: {} characters (max {})", field, len, max)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}
