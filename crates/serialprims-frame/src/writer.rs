use std::io::{ErrorKind, Write};

use bytes::{Bytes, BytesMut};
use serialprims_port::write_fully;
use tracing::trace;

use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes payloads, optionally followed by a line ending, to any `Write` channel.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    line_ending: Bytes,
}

impl<T: Write> FrameWriter<T> {
    /// Create a writer that terminates lines with `"\n"`.
    pub fn new(inner: T) -> Self {
        Self::with_line_ending(inner, b"\n")
    }

    /// Create a writer with an explicit line ending (may be empty).
    pub fn with_line_ending(inner: T, line_ending: impl AsRef<[u8]>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            line_ending: Bytes::copy_from_slice(line_ending.as_ref()),
        }
    }

    /// Write `payload` as-is and flush. Returns the number of bytes written.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        write_fully(&mut self.inner, payload)?;
        trace!(len = payload.len(), "payload written");
        self.flush()?;
        Ok(payload.len())
    }

    /// Write `payload` followed by the line ending in a single write sequence.
    pub fn send_line(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&self.line_ending);

        write_fully(&mut self.inner, &self.buf)?;
        trace!(len = self.buf.len(), "line written");
        self.flush()?;
        Ok(self.buf.len())
    }

    /// Flush the underlying channel.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn line_ending(&self) -> &[u8] {
        &self.line_ending
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner channel.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
