//! Wire frame representation and the header-block grammar.
//!
//! One frame is a block of `Key: Value` lines terminated by a blank line,
//! optionally followed by a `Content-Length`-delimited raw body. The same
//! grammar is re-run on the body of event frames, which carry a second,
//! nested frame as their payload.
//!
//! Lines end with `\n`; a `\r` before the `\n` is tolerated and stripped
//! (the switch itself sends bare `\n`, but commands are written with CRLF).

use crate::error::{EventSockError, Result};

/// A parsed wire frame: raw header lines (order preserved, keys untouched)
/// plus an optional raw body.
///
/// Ephemeral; constructed per read and discarded once classified.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Header lines in arrival order. Keys are as received, values trimmed.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes, present when `Content-Length` was.
    pub body: Option<String>,
}

impl Frame {
    /// First value for a header key, matched exactly as received.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The frame's type tag.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Parse the nested frame carried in an event payload.
    ///
    /// The outer `Content-Length` already bounds `body`, so the whole nested
    /// frame is in hand: a header block terminated by a blank line (or by
    /// end of input, for a body-less nested block), then exactly
    /// `Content-Length` bytes of inner body if that header is present.
    pub fn parse_nested(body: &str) -> Result<Frame> {
        let bytes = body.as_bytes();
        let (header_end, resume) = match find_blank_line(bytes) {
            Some(pos) => pos,
            None => (bytes.len(), bytes.len()),
        };

        let headers = parse_header_block(&body[..header_end])?;
        let frame = Frame {
            headers,
            body: None,
        };

        let inner_body = match content_length(&frame)? {
            None | Some(0) => None,
            Some(len) => {
                let rest = &bytes[resume.min(bytes.len())..];
                if rest.len() < len {
                    return Err(EventSockError::Framing(format!(
                        "nested body truncated: want {} bytes, have {}",
                        len,
                        rest.len()
                    )));
                }
                // The length is peer-controlled and counts bytes; it may
                // land mid-character even when the surrounding text is
                // valid UTF-8.
                let inner = std::str::from_utf8(&rest[..len]).map_err(|_| {
                    EventSockError::Framing(format!(
                        "nested body is not valid UTF-8 at declared length {len}"
                    ))
                })?;
                Some(inner.to_string())
            }
        };

        Ok(Frame {
            body: inner_body,
            ..frame
        })
    }
}

/// Parse a header block (no terminator included) into key/value pairs.
///
/// Every non-empty line must contain a colon; anything else is a framing
/// error, since a desynced stream has no recovery point.
pub(crate) fn parse_header_block(block: &str) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let colon = line.find(':').ok_or_else(|| {
            EventSockError::Framing(format!("header line without colon: {line:?}"))
        })?;
        let key = line[..colon].trim().to_string();
        let value = line[colon + 1..].trim().to_string();
        if key.is_empty() {
            return Err(EventSockError::Framing(format!(
                "header line with empty key: {line:?}"
            )));
        }
        headers.push((key, value));
    }
    Ok(headers)
}

/// `Content-Length` of a frame, or a framing error if present but not a
/// non-negative integer.
pub(crate) fn content_length(frame: &Frame) -> Result<Option<usize>> {
    match frame.header("Content-Length") {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
            EventSockError::Framing(format!("invalid Content-Length: {raw:?}"))
        }),
    }
}

/// Locate the blank line terminating a header block.
///
/// Returns `(header_end, resume)`: the byte offset where the header text
/// ends and the offset of the first byte after the terminator. Both `\n\n`
/// and `\n\r\n` terminate (lines may or may not carry `\r`).
pub(crate) fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] != b'\n' {
            i += 1;
            continue;
        }
        match buf.get(i + 1) {
            Some(b'\n') => return Some((i + 1, i + 2)),
            Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i + 1, i + 3)),
            _ => i += 1,
        }
    }
    None
}
