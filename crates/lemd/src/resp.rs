//! RESP2 frame codec
//!
//! Frames are parsed incrementally: a partial frame leaves the buffer
//! untouched and yields `Ok(None)`.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Largest accepted bulk string (512 MiB, same as Redis)
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest accepted array (1Mi elements)
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Deepest accepted array nesting
const MAX_DEPTH: usize = 32;

/// Malformed input on the wire
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// First byte is not a RESP2 type marker
    #[error("Protocol error: unknown frame type '{0}'")]
    UnknownType(char),

    /// Simple string, error or length line is not UTF-8
    #[error("Protocol error: invalid UTF-8 in line")]
    InvalidUtf8,

    /// Integer or length line does not parse
    #[error("Protocol error: invalid integer '{0}'")]
    InvalidInteger(String),

    /// Negative length other than the nil marker
    #[error("Protocol error: invalid {kind} length {len}")]
    InvalidLength {
        /// Frame kind being parsed
        kind: &'static str,
        /// Length as sent
        len: i64,
    },

    /// Declared length exceeds the accepted maximum
    #[error("Protocol error: {kind} of {len} exceeds limit of {max}")]
    TooLarge {
        /// Frame kind being parsed
        kind: &'static str,
        /// Length as sent
        len: usize,
        /// Accepted maximum
        max: usize,
    },

    /// Bulk string payload not followed by CRLF
    #[error("Protocol error: bulk string not terminated by CRLF")]
    MissingTerminator,

    /// Arrays nested beyond the accepted depth
    #[error("Protocol error: arrays nested deeper than {0}")]
    TooDeep(usize),
}

/// A single RESP2 value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$3\r\nfoo\r\n`, or `$-1\r\n` for nil
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, or `*-1\r\n` for nil
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// `+OK`
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    /// Nil bulk string
    pub fn null() -> Frame {
        Frame::Bulk(None)
    }

    /// Bulk string holding `data`
    pub fn bulk(data: impl Into<Vec<u8>>) -> Frame {
        Frame::Bulk(Some(data.into()))
    }

    /// Error reply; `msg` should start with an error code such as `ERR`
    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }

    /// Parse one frame from the front of `buf`, consuming it on success
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        match parse_frame(&buf[..], 0)? {
            Some((frame, used)) => {
                buf.advance(used);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Append the wire encoding of this frame to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                put_line(dst, s.as_bytes());
            }
            Frame::Error(e) => {
                dst.put_u8(b'-');
                put_line(dst, e.as_bytes());
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                put_line(dst, n.to_string().as_bytes());
            }
            Frame::Bulk(None) => dst.put_slice(b"$-1\r\n"),
            Frame::Bulk(Some(data)) => {
                dst.put_u8(b'$');
                put_line(dst, data.len().to_string().as_bytes());
                put_line(dst, data);
            }
            Frame::Array(None) => dst.put_slice(b"*-1\r\n"),
            Frame::Array(Some(items)) => {
                dst.put_u8(b'*');
                put_line(dst, items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> BytesMut {
        let mut dst = BytesMut::new();
        self.encode(&mut dst);
        dst
    }
}

fn put_line(dst: &mut BytesMut, line: &[u8]) {
    dst.put_slice(line);
    dst.put_slice(b"\r\n");
}

/// Returns the frame and the number of bytes it occupies
///
/// `depth` counts the arrays enclosing this frame.
fn parse_frame(src: &[u8], depth: usize) -> Result<Option<(Frame, usize)>, ProtocolError> {
    let Some(&tag) = src.first() else {
        return Ok(None);
    };
    let Some((line, line_len)) = read_line(&src[1..]) else {
        return Ok(None);
    };
    let mut used = 1 + line_len;

    let frame = match tag {
        b'+' => Frame::Simple(utf8(line)?),
        b'-' => Frame::Error(utf8(line)?),
        b':' => Frame::Integer(integer(line)?),
        b'$' => {
            let Some(len) = length(line, "bulk string", MAX_BULK_LEN)? else {
                return Ok(Some((Frame::Bulk(None), used)));
            };

            let body = &src[used..];
            if body.len() < len + 2 {
                return Ok(None);
            }
            if &body[len..len + 2] != b"\r\n" {
                return Err(ProtocolError::MissingTerminator);
            }
            used += len + 2;
            Frame::Bulk(Some(body[..len].to_vec()))
        }
        b'*' => {
            if depth >= MAX_DEPTH {
                return Err(ProtocolError::TooDeep(MAX_DEPTH));
            }
            let Some(len) = length(line, "array", MAX_ARRAY_LEN)? else {
                return Ok(Some((Frame::Array(None), used)));
            };

            let mut items = Vec::with_capacity(len.min(64));
            for _ in 0..len {
                match parse_frame(&src[used..], depth + 1)? {
                    Some((item, n)) => {
                        items.push(item);
                        used += n;
                    }
                    None => return Ok(None),
                }
            }
            Frame::Array(Some(items))
        }
        other => return Err(ProtocolError::UnknownType(other as char)),
    };

    Ok(Some((frame, used)))
}

/// Line contents and its length including the CRLF
fn read_line(src: &[u8]) -> Option<(&[u8], usize)> {
    src.windows(2)
        .position(|w| w == b"\r\n")
        .map(|end| (&src[..end], end + 2))
}

fn utf8(line: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(line.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

fn integer(line: &[u8]) -> Result<i64, ProtocolError> {
    let text = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
    text.parse()
        .map_err(|_| ProtocolError::InvalidInteger(text.to_string()))
}

/// `None` for the nil length `-1`
fn length(line: &[u8], kind: &'static str, max: usize) -> Result<Option<usize>, ProtocolError> {
    let len = integer(line)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength { kind, len });
    }

    let len = len as usize;
    if len > max {
        return Err(ProtocolError::TooLarge { kind, len, max });
    }
    Ok(Some(len))
}
