//! Frame reader: accumulates socket bytes into complete messages.
//!
//! Ordinary traffic is one `\n`-terminated line per message. Channel
//! enumerations arrive as multi-line BEGIN…END blocks that must reach the
//! parser as one atomic unit, so while the buffered data starts with a
//! `BEGIN` marker the reader keeps accumulating until an `END` marker
//! lands in the buffer tail, then hands back the whole block.
//!
//! Partial reads are buffered in a `BytesMut`; feeding more bytes picks up
//! exactly where the previous read stopped.

use bytes::BytesMut;

/// Marker opening a multi-line atomic block.
const BLOCK_BEGIN: &[u8] = b"BEGIN";

/// Marker closing a multi-line atomic block.
const BLOCK_END: &[u8] = b"END";

/// Window inspected for the closing marker. Wide enough for `END\r\n`.
const END_TAIL_WINDOW: usize = 5;

/// Accumulates incoming bytes and extracts complete protocol messages.
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    /// Create an empty frame reader.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Feed raw bytes from a socket read and extract all complete messages.
    ///
    /// Returns an empty vector while a message is still incomplete; the
    /// partial data stays buffered for the next feed. Bytes are decoded
    /// lossily to UTF-8 at message boundaries.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(message) = self.try_extract_one() {
            messages.push(message);
        }
        messages
    }

    /// Try to extract one complete message from the buffer.
    ///
    /// A message ends at a newline when no block is open, or at an `END`
    /// marker in the tail once the buffer started with `BEGIN`. Two blocks
    /// back to back without an intervening newline are undefined input.
    fn try_extract_one(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }

        if self.buf.starts_with(BLOCK_BEGIN) {
            if !self.block_is_complete() {
                return None;
            }
            let block = self.buf.split_to(self.buf.len());
            return Some(String::from_utf8_lossy(&block).into_owned());
        }

        let newline = self.buf.iter().position(|&b| b == b'\n')?;
        let line = self.buf.split_to(newline + 1);
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whether the open block has its closing marker in the buffer tail.
    fn block_is_complete(&self) -> bool {
        let tail_start = self.buf.len().saturating_sub(END_TAIL_WINDOW);
        self.buf[tail_start..]
            .windows(BLOCK_END.len())
            .any(|w| w == BLOCK_END)
    }

    /// Number of buffered bytes still waiting for a message boundary.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
