//! TOON file codec using nom
//!
//! Data file format:
//! ```text
//! TOON001
//! [version: u32]
//! [row_count: u32]
//! ...record lines (\n-terminated)...
//! ```
//!
//! Record line format:
//! ```text
//! book{id,title,author,description}: 1,"Dune","Frank Herbert",~
//! ```
//!
//! Strings are double-quoted with `\\`, `\"`, `\n` and `\r` escapes.
//! A missing description is written as `~`.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until},
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, value},
    multi::many0,
    number::complete::le_u32,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use crate::book::Book;
use crate::error::{Error, Result};

/// Magic header for TOON data files
pub const TOON_MAGIC: &[u8] = b"TOON001\n";

/// Magic header for TOON index files
pub const TOON_IDX_MAGIC: &[u8] = b"TOONIDX1";

/// Current data file version
pub const TOON_VERSION: u32 = 1;

/// Byte length of the data file header
pub const HEADER_LEN: usize = 16;

/// Field declaration that prefixes every record line
pub const RECORD_PREFIX: &[u8] = b"book{id,title,author,description}: ";

/// TOON data file header
#[derive(Debug, Clone, PartialEq)]
pub struct ToonHeader {
    /// File format version
    pub version: u32,
    /// Number of rows in the file
    pub row_count: u32,
}

/// Parse the data file header
pub fn parse_header(input: &[u8]) -> Result<ToonHeader> {
    let (_, (version, row_count)) =
        header(input).map_err(|_| Error::Parse("Invalid TOON header".to_string()))?;

    Ok(ToonHeader { version, row_count })
}

/// Create a data file header
pub fn create_header(version: u32, row_count: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(TOON_MAGIC);
    header.extend_from_slice(&version.to_le_bytes());
    header.extend_from_slice(&row_count.to_le_bytes());
    header
}

/// Parse the index file header, returning the offset count
pub fn parse_index_header(input: &[u8]) -> Result<u32> {
    let (_, count) = index_header(input)
        .map_err(|_| Error::Parse("Invalid index file magic".to_string()))?;

    Ok(count)
}

/// Parse a single raw line, without the trailing newline
pub fn parse_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\n"), char('\n'))(input)
}

/// Encode a book as a record line (without trailing newline)
pub fn encode_record(book: &Book) -> Vec<u8> {
    let mut line = Vec::with_capacity(RECORD_PREFIX.len() + book.title.len() + book.author.len() + 32);
    line.extend_from_slice(RECORD_PREFIX);
    line.extend_from_slice(book.id.to_string().as_bytes());
    line.push(b',');
    push_quoted(&mut line, &book.title);
    line.push(b',');
    push_quoted(&mut line, &book.author);
    line.push(b',');
    match &book.description {
        Some(desc) => push_quoted(&mut line, desc),
        None => line.push(b'~'),
    }
    line
}

/// Decode a complete record line
pub fn decode_record(line: &[u8]) -> Result<Book> {
    let (_, book) = all_consuming(record)(line)?;
    Ok(book)
}

fn header(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    preceded(tag(TOON_MAGIC), tuple((le_u32, le_u32)))(input)
}

fn index_header(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(tag(TOON_IDX_MAGIC), le_u32)(input)
}

fn push_quoted(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for b in s.bytes() {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.push(b'"');
}

fn record(input: &[u8]) -> IResult<&[u8], Book> {
    let (input, (id, _, title, _, author, _, description)) = preceded(
        tag(RECORD_PREFIX),
        tuple((
            record_id,
            char(','),
            quoted,
            char(','),
            quoted,
            char(','),
            optional_quoted,
        )),
    )(input)?;

    Ok((
        input,
        Book {
            id,
            title,
            author,
            description,
        },
    ))
}

fn record_id(input: &[u8]) -> IResult<&[u8], u64> {
    map_res(digit1, |digits: &[u8]| {
        std::str::from_utf8(digits)
            .map_err(|_| ())
            .and_then(|s| s.parse::<u64>().map_err(|_| ()))
    })(input)
}

fn quoted(input: &[u8]) -> IResult<&[u8], String> {
    let fragment = alt((
        map(is_not("\\\""), |s: &[u8]| s.to_vec()),
        map(preceded(char('\\'), one_of("\\\"nr")), |c: char| {
            let b = match c {
                'n' => b'\n',
                'r' => b'\r',
                other => other as u8,
            };
            vec![b]
        }),
    ));

    map_res(delimited(char('"'), many0(fragment), char('"')), |parts: Vec<Vec<u8>>| {
        String::from_utf8(parts.concat())
    })(input)
}

fn optional_quoted(input: &[u8]) -> IResult<&[u8], Option<String>> {
    alt((value(None, char('~')), map(quoted, Some)))(input)
}
