//! Newline-delimited framing for inbound bytes.
//!
//! A chunk read from the transport may hold several frames, part of one, or
//! both. Complete frames are emitted in the order their `\n` arrived; the
//! unterminated tail stays buffered until more bytes (or end of stream).

/// Longest unterminated frame a server may send.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Accumulates inbound bytes and splits them into text frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    limit: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { buf: Vec::new(), limit }
    }

    /// The incomplete trailing frame has grown past the limit. A server that
    /// never sends a newline would otherwise be buffered without bound.
    pub fn over_limit(&self) -> bool {
        self.buf.len() > self.limit
    }

    /// Append a chunk and return every frame it completed.
    ///
    /// Blank lines are dropped and surrounding whitespace (including a
    /// trailing `\r`) is trimmed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let search_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let Some(last_newline) = self.buf[search_from..]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|pos| search_from + pos)
        else {
            return Vec::new();
        };

        let tail = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, tail);
        complete.split(|&b| b == b'\n').filter_map(to_frame).collect()
    }

    /// Bytes of the incomplete trailing frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Take the unterminated tail at end of stream, if it holds anything
    /// besides whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buf);
        to_frame(&tail)
    }
}

fn to_frame(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
