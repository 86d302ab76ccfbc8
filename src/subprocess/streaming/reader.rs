//! Bounded, cancel-safe line reader
//!
//! `tokio::io::Lines` buffers an entire line before returning it, so a single
//! runaway line can grow without limit. This reader stops buffering once a line
//! passes `max_line_bytes` and discards the rest of it as it arrives.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One line read from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLine {
    Complete(String),
    /// The line exceeded the limit; carries its total length in bytes
    Oversized(usize),
}

/// Line reader that never holds more than `max_line_bytes` of a single line
///
/// All partial-line state lives in the struct, so `next_line` can be dropped
/// mid-read (e.g. as a losing `select!` branch) without losing data.
pub struct BoundedLineReader<R> {
    inner: R,
    max_line_bytes: usize,
    buf: Vec<u8>,
    discarded: usize,
    finished: bool,
}

impl<R: AsyncBufRead + Unpin> BoundedLineReader<R> {
    pub fn new(inner: R, max_line_bytes: usize) -> Self {
        Self {
            inner,
            max_line_bytes,
            buf: Vec::new(),
            discarded: 0,
            finished: false,
        }
    }

    /// Read the next line, or `None` at end of stream
    pub async fn next_line(&mut self) -> std::io::Result<Option<RawLine>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let available = self.inner.fill_buf().await?;

            if available.is_empty() {
                self.finished = true;
                if self.buf.is_empty() && self.discarded == 0 {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let chunk_len = newline.unwrap_or(available.len());
            let chunk = &available[..chunk_len];

            if self.discarded > 0 || self.buf.len() + chunk.len() > self.max_line_bytes {
                self.discarded += self.buf.len() + chunk.len();
                self.buf.clear();
            } else {
                self.buf.extend_from_slice(chunk);
            }

            match newline {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                }
            }
        }
    }

    fn take_line(&mut self) -> RawLine {
        if self.discarded > 0 {
            let len = std::mem::take(&mut self.discarded);
            self.buf.clear();
            return RawLine::Oversized(len);
        }

        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        RawLine::Complete(String::from_utf8_lossy(&bytes).into_owned())
    }
}
