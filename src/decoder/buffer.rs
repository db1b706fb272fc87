use std::ops::Range;

/// Append-only byte store with a parse cursor.
///
/// Bytes before the cursor have been consumed by the parser but stay
/// addressable by absolute range, since frame bitstreams are decoded from
/// them on demand.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are ignored.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Total bytes received so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute offset of the first unconsumed byte.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes received but not yet consumed.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// The next `len` unconsumed bytes, if they have all arrived.
    pub fn peek(&self, len: usize) -> Option<&[u8]> {
        self.unconsumed().get(..len)
    }

    pub fn consume(&mut self, len: usize) {
        debug_assert!(self.cursor + len <= self.data.len());
        self.cursor = (self.cursor + len).min(self.data.len());
    }

    /// Bytes at an absolute range, if they have all arrived.
    pub fn slice(&self, range: Range<usize>) -> Option<&[u8]> {
        self.data.get(range)
    }
}
