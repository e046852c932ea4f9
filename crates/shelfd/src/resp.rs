//! RESP2 framing for the shelfd command protocol
//!
//! Clients send commands as arrays of bulk strings (what redis-cli does) or
//! as inline space-separated lines (what telnet does). Replies use the
//! regular RESP2 types.

use std::fmt;

use bytes::{Buf, BytesMut};

/// Maximum bulk string size (16 MB)
const MAX_BULK_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of array elements
const MAX_ARRAY_LEN: usize = 1024;

/// Maximum inline command or header line length (64 KB)
const MAX_LINE_LEN: usize = 64 * 1024;

/// Maximum array nesting; commands only use one level
const MAX_DEPTH: usize = 8;

/// A RESP2 frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, or `$-1\r\n` for null
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, or `*-1\r\n` for null
    Array(Option<Vec<Frame>>),
}

/// Malformed or oversized input
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Input violates the protocol
    Protocol(String),
    /// A length prefix exceeds the configured maximum
    TooLarge {
        /// What was too large
        what: &'static str,
        /// Announced size
        len: usize,
        /// Allowed size
        max: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            FrameError::TooLarge { what, len, max } => {
                write!(f, "{} too large: {} (max {})", what, len, max)
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl Frame {
    /// `+OK`
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    /// Error reply with the conventional `ERR` prefix
    pub fn error(msg: impl fmt::Display) -> Frame {
        Frame::Error(format!("ERR {}", msg))
    }

    /// Non-null bulk string
    pub fn bulk(data: impl Into<Vec<u8>>) -> Frame {
        Frame::Bulk(Some(data.into()))
    }

    /// Null bulk string
    pub fn null() -> Frame {
        Frame::Bulk(None)
    }

    /// Append the wire encoding of this frame to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => write_line(out, b'+', s.as_bytes()),
            Frame::Error(e) => write_line(out, b'-', e.as_bytes()),
            Frame::Integer(i) => write_line(out, b':', i.to_string().as_bytes()),
            Frame::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Frame::Bulk(Some(data)) => {
                write_line(out, b'$', data.len().to_string().as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Frame::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            Frame::Array(Some(items)) => {
                write_line(out, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    /// Wire encoding of this frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when more data is needed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut reader = Reader { buf: &buf[..], pos: 0 };
        let frame = match buf[0] {
            b'+' | b'-' | b':' | b'$' | b'*' => reader.frame(0)?,
            _ => reader.inline()?,
        };

        match frame {
            Some(frame) => {
                let consumed = reader.pos;
                buf.advance(consumed);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Command arguments of an array-of-bulk-strings frame
    pub fn into_args(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Frame::Array(Some(items)) if !items.is_empty() => items
                .into_iter()
                .map(|item| match item {
                    Frame::Bulk(Some(data)) => Some(data),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

fn write_line(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.push(marker);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Next `\r\n`-terminated line, without the terminator
    fn line(&mut self) -> Result<Option<&'a [u8]>, FrameError> {
        let rest = &self.buf[self.pos..];
        let window = &rest[..rest.len().min(MAX_LINE_LEN + 2)];
        let Some(end) = window.windows(2).position(|w| w == b"\r\n") else {
            if rest.len() > MAX_LINE_LEN {
                return Err(FrameError::TooLarge {
                    what: "line",
                    len: rest.len(),
                    max: MAX_LINE_LEN,
                });
            }
            return Ok(None);
        };
        self.pos += end + 2;
        Ok(Some(&rest[..end]))
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        if rest.len() < n {
            return None;
        }
        self.pos += n;
        Some(&rest[..n])
    }

    fn frame(&mut self, depth: usize) -> Result<Option<Frame>, FrameError> {
        let Some(marker) = self.take(1).map(|b| b[0]) else {
            return Ok(None);
        };
        let Some(line) = self.line()? else {
            return Ok(None);
        };

        let frame = match marker {
            b'+' => Frame::Simple(utf8(line)?),
            b'-' => Frame::Error(utf8(line)?),
            b':' => Frame::Integer(integer(line)?),
            b'$' => match length(line, "bulk string", MAX_BULK_LEN)? {
                None => Frame::Bulk(None),
                Some(len) => {
                    let Some(data) = self.take(len) else {
                        return Ok(None);
                    };
                    let Some(end) = self.take(2) else {
                        return Ok(None);
                    };
                    if end != b"\r\n" {
                        return Err(FrameError::Protocol(
                            "expected CRLF after bulk string".to_string(),
                        ));
                    }
                    Frame::Bulk(Some(data.to_vec()))
                }
            },
            b'*' => match length(line, "array", MAX_ARRAY_LEN)? {
                None => Frame::Array(None),
                Some(_) if depth >= MAX_DEPTH => {
                    return Err(FrameError::Protocol(format!(
                        "arrays nested deeper than {}",
                        MAX_DEPTH
                    )))
                }
                Some(len) => {
                    let mut items = Vec::with_capacity(len);
                    for _ in 0..len {
                        match self.frame(depth + 1)? {
                            Some(item) => items.push(item),
                            None => return Ok(None),
                        }
                    }
                    Frame::Array(Some(items))
                }
            },
            other => {
                return Err(FrameError::Protocol(format!(
                    "unknown frame type '{}'",
                    other as char
                )))
            }
        };

        Ok(Some(frame))
    }

    /// Inline command: one `\n`-terminated line of space-separated words
    fn inline(&mut self) -> Result<Option<Frame>, FrameError> {
        let rest = &self.buf[self.pos..];
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            if rest.len() > MAX_LINE_LEN {
                return Err(FrameError::TooLarge {
                    what: "inline command",
                    len: rest.len(),
                    max: MAX_LINE_LEN,
                });
            }
            return Ok(None);
        };
        self.pos += end + 1;

        let line = utf8(&rest[..end])?;
        let args = line
            .split_whitespace()
            .map(|word| Frame::bulk(word.as_bytes()))
            .collect();

        Ok(Some(Frame::Array(Some(args))))
    }
}

fn utf8(bytes: &[u8]) -> Result<String, FrameError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| FrameError::Protocol(e.to_string()))
}

fn integer(bytes: &[u8]) -> Result<i64, FrameError> {
    utf8(bytes)?
        .parse::<i64>()
        .map_err(|e| FrameError::Protocol(e.to_string()))
}

/// Length prefix; `-1` means null
fn length(bytes: &[u8], what: &'static str, max: usize) -> Result<Option<usize>, FrameError> {
    let len = integer(bytes)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(FrameError::Protocol(format!("negative {} length", what)));
    }

    let len = len as usize;
    if len > max {
        return Err(FrameError::TooLarge { what, len, max });
    }
    Ok(Some(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> Result<Option<Frame>, FrameError> {
        Frame::decode(&mut BytesMut::from(data))
    }

    #[test]
    fn test_simple_types() {
        assert_eq!(decode(b"+OK\r\n").unwrap(), Some(Frame::ok()));
        assert_eq!(
            decode(b"-ERR nope\r\n").unwrap(),
            Some(Frame::Error("ERR nope".to_string()))
        );
        assert_eq!(decode(b":1000\r\n").unwrap(), Some(Frame::Integer(1000)));
        assert_eq!(decode(b"$-1\r\n").unwrap(), Some(Frame::null()));
    }

    #[test]
    fn test_command_array() {
        let data = b"*3\r\n$3\r\nADD\r\n$4\r\nDune\r\n$7\r\nHerbert\r\n";
        let mut buf = BytesMut::from(&data[..]);

        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        assert_eq!(
            frame.into_args().unwrap(),
            vec![b"ADD".to_vec(), b"Dune".to_vec(), b"Herbert".to_vec()]
        );
    }

    #[test]
    fn test_pipelined_frames() {
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*1\r\n$6\r\nDBSIZE\r\n"[..]);

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        let second = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(first.into_args().unwrap(), vec![b"PING".to_vec()]);
        assert_eq!(second.into_args().unwrap(), vec![b"DBSIZE".to_vec()]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_incomplete_data_is_left_in_buffer() {
        let mut buf = BytesMut::from(&b"*2\r\n$6\r\nSEARCH\r\n$4\r\nDu"[..]);
        let len = buf.len();

        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), len);

        buf.extend_from_slice(b"ne\r\n");
        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.into_args().unwrap()[1], b"Dune".to_vec());
    }

    #[test]
    fn test_inline_command() {
        let mut buf = BytesMut::from(&b"SEARCH the  hobbit\r\n"[..]);

        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame.into_args().unwrap(),
            vec![b"SEARCH".to_vec(), b"the".to_vec(), b"hobbit".to_vec()]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_lengths_rejected() {
        assert!(matches!(
            decode(b"$99999999999\r\n"),
            Err(FrameError::TooLarge { what: "bulk string", .. })
        ));
        assert!(matches!(
            decode(b"*5000\r\n"),
            Err(FrameError::TooLarge { what: "array", .. })
        ));
        assert!(matches!(decode(b"$-5\r\n"), Err(FrameError::Protocol(_))));
    }

    #[test]
    fn test_bulk_without_crlf_rejected() {
        assert!(matches!(decode(b"$3\r\nabcXY"), Err(FrameError::Protocol(_))));
    }

    #[test]
    fn test_nesting_depth_limited() {
        let nested = b"*1\r\n".repeat(500_000);
        assert!(matches!(decode(&nested), Err(FrameError::Protocol(_))));

        let mut shallow = b"*1\r\n".repeat(MAX_DEPTH);
        shallow.extend_from_slice(b"$2\r\nhi\r\n");
        assert!(decode(&shallow).unwrap().is_some());
    }

    #[test]
    fn test_unterminated_header_line_rejected() {
        for marker in [b'+', b'-', b':', b'$', b'*'] {
            let mut data = vec![marker];
            data.extend(std::iter::repeat(b'a').take(MAX_LINE_LEN + 1));
            assert!(matches!(
                decode(&data),
                Err(FrameError::TooLarge { what: "line", .. })
            ));
        }

        // Short partial lines still wait for more data
        assert!(decode(b"+partial").unwrap().is_none());
    }

    #[test]
    fn test_encode() {
        assert_eq!(Frame::ok().to_bytes(), b"+OK\r\n");
        assert_eq!(Frame::error("boom").to_bytes(), b"-ERR boom\r\n");
        assert_eq!(Frame::Integer(-3).to_bytes(), b":-3\r\n");
        assert_eq!(Frame::bulk("hi").to_bytes(), b"$2\r\nhi\r\n");
        assert_eq!(
            Frame::Array(Some(vec![Frame::Integer(1), Frame::null()])).to_bytes(),
            b"*2\r\n:1\r\n$-1\r\n"
        );
    }

    #[test]
    fn test_into_args_rejects_non_commands() {
        assert!(Frame::Integer(1).into_args().is_none());
        assert!(Frame::Array(Some(vec![])).into_args().is_none());
        assert!(Frame::Array(Some(vec![Frame::Integer(1)])).into_args().is_none());
    }
}
