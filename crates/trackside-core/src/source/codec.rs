//! Newline framing for the telemetry stream
//!
//! Like `LinesCodec`, but radio noise never becomes a stream error: invalid
//! UTF-8 is decoded lossily and overlong lines are skipped up to the next
//! newline instead of failing the connection.

use std::io;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest line accepted before it is discarded as noise
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits a byte stream into text lines
#[derive(Debug, Clone)]
pub struct TelemetryLineCodec {
    /// Where to resume the newline search in the buffer
    next_index: usize,
    max_length: usize,
    /// Inside an overlong line, dropping bytes until the next newline
    discarding: bool,
}

impl Default for TelemetryLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryLineCodec {
    /// Create a codec with the default maximum line length
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            discarding: false,
        }
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for TelemetryLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let read_to = buf.len().min(self.max_length.saturating_add(1));
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(newline_index + 1);
                    return Ok(Some(to_line(&line[..newline_index])));
                }
                (false, None) if buf.len() > self.max_length => {
                    tracing::trace!(max = self.max_length, "Discarding overlong line");
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        Ok(match self.decode(buf)? {
            Some(line) => Some(line),
            None if buf.is_empty() || self.discarding => None,
            None => {
                let line = buf.split_to(buf.len());
                self.next_index = 0;
                Some(to_line(&line))
            }
        })
    }
}
