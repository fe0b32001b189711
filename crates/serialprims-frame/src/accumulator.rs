use bytes::{Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 256;

/// Append-only byte buffer for the frame currently being read.
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    buf: BytesMut,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.extend_from_slice(&[byte]);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Byte-exact suffix match. False when the buffer is shorter than `pattern`.
    pub fn ends_with(&self, pattern: &[u8]) -> bool {
        self.buf.len() >= pattern.len() && self.buf[self.buf.len() - pattern.len()..] == *pattern
    }

    /// Substring match anywhere in the buffer.
    pub fn contains(&self, pattern: &[u8]) -> bool {
        if pattern.is_empty() {
            return true;
        }
        self.buf.windows(pattern.len()).any(|window| window == pattern)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Render the buffer as text, replacing invalid UTF-8 sequences.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    /// Take the contents as text, leaving the buffer empty.
    pub fn drain_text(&mut self) -> String {
        let text = self.to_text();
        self.buf.clear();
        text
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}
