//! Frame buffer for accumulating partial socket reads.
//!
//! Uses `bytes::BytesMut` and a two-state machine to extract complete
//! frames from an arbitrarily fragmented byte stream:
//! - `WaitingForHeaders`: need a blank-line terminated header block
//! - `WaitingForBody`: headers parsed, need `Content-Length` more bytes
//!
//! The buffer has no protocol knowledge beyond the frame grammar; routing
//! by content type happens in the classifier.

use bytes::BytesMut;

use super::frame::{content_length, find_blank_line, parse_header_block, Frame};
use crate::error::{EventSockError, Result};

/// Default maximum frame size (headers plus body), 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug)]
enum State {
    WaitingForHeaders,
    WaitingForBody {
        headers: Vec<(String, String)>,
        remaining: usize,
    },
}

/// Accumulates incoming bytes and extracts complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with the default size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame buffer with a custom size limit. A header block or
    /// declared body exceeding the limit is a framing error.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeaders,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is retained internally for the next push. Returns a
    /// framing error on a malformed header block, an invalid or oversized
    /// `Content-Length`, or an unbounded header block growing past the
    /// size limit; the stream has no recovery point after any of these.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Append data without extracting frames. Pair with [`try_extract`]
    /// when frames must be taken one at a time (the auth handshake reads
    /// exactly one frame and leaves the rest buffered for the read loop).
    ///
    /// [`try_extract`]: FrameBuffer::try_extract
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single complete frame from buffered data.
    pub fn try_extract(&mut self) -> Result<Option<Frame>> {
        self.try_extract_one()
    }

    /// Number of buffered bytes not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeaders => {
                let (header_end, resume) = match find_blank_line(&self.buffer) {
                    Some(pos) => pos,
                    None => {
                        if self.buffer.len() > self.max_frame_size {
                            return Err(EventSockError::Framing(format!(
                                "header block exceeds {} bytes without terminator",
                                self.max_frame_size
                            )));
                        }
                        return Ok(None);
                    }
                };

                let block = std::str::from_utf8(&self.buffer[..header_end])
                    .map_err(|_| EventSockError::Framing("invalid UTF-8 in headers".into()))?;
                let headers = parse_header_block(block)?;
                let _ = self.buffer.split_to(resume);

                let frame = Frame {
                    headers,
                    body: None,
                };
                match content_length(&frame)? {
                    None => Ok(Some(frame)),
                    Some(len) if len > self.max_frame_size => Err(EventSockError::Framing(
                        format!("Content-Length {} exceeds limit {}", len, self.max_frame_size),
                    )),
                    Some(len) => {
                        self.state = State::WaitingForBody {
                            headers: frame.headers,
                            remaining: len,
                        };
                        self.try_extract_one()
                    }
                }
            }

            State::WaitingForBody { remaining, .. } => {
                let remaining = *remaining;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let body_bytes = self.buffer.split_to(remaining);
                let body = std::str::from_utf8(&body_bytes)
                    .map_err(|_| EventSockError::Framing("invalid UTF-8 in body".into()))?
                    .to_string();

                let headers = match std::mem::replace(&mut self.state, State::WaitingForHeaders) {
                    State::WaitingForBody { headers, .. } => headers,
                    State::WaitingForHeaders => unreachable!(),
                };

                Ok(Some(Frame {
                    headers,
                    body: Some(body),
                }))
            }
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
