use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::PortConfig;
use crate::error::{PortError, Result};

#[cfg(unix)]
use crate::posix as sys;
#[cfg(windows)]
use crate::windows as sys;

/// An open serial device. Implements `Read` and `Write`.
///
/// Reads never wait for data: they return `Ok(0)` when nothing is
/// immediately available. Once [`close`](SerialPort::close) has been called,
/// every read and write fails with `ErrorKind::NotConnected`.
pub struct SerialPort {
    file: Option<File>,
    path: PathBuf,
    config: PortConfig,
}

impl SerialPort {
    /// Open and configure the device at `path`.
    pub fn open(path: impl AsRef<Path>, config: PortConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = sys::open(&path, &config)?;
        info!(?path, %config, "opened serial port");
        Ok(Self {
            file: Some(file),
            path,
            config,
        })
    }

    /// Open with the default 9600 8N1 configuration.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, PortConfig::default())
    }

    /// Re-apply line settings on the open device.
    pub fn set_config(&mut self, config: PortConfig) -> Result<()> {
        let file = self.file_ref()?;
        sys::configure(file, &self.path, &config)?;
        debug!(path = ?self.path, %config, "reconfigured serial port");
        self.config = config;
        Ok(())
    }

    /// Read a single byte if one is immediately available.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(err) => return Err(PortError::Io(err)),
            }
        }
    }

    /// Write all of `data`, returning the number of bytes written.
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(write_fully(self, data)?)
    }

    /// Close the device. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "closed serial port");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Try to clone this port (creates a new descriptor for the same device).
    pub fn try_clone(&self) -> Result<Self> {
        let file = self.file_ref()?.try_clone()?;
        Ok(Self {
            file: Some(file),
            path: self.path.clone(),
            config: self.config,
        })
    }

    /// The device address this port was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current line settings.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    fn file_ref(&self) -> io::Result<&File> {
        self.file.as_ref().ok_or_else(closed_error)
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(closed_error)
    }
}

/// Write all of `bytes` to a channel that may accept them piecemeal.
///
/// `Interrupted` and `WouldBlock` are retried. A write that accepts zero
/// bytes fails with `ErrorKind::WriteZero`.
pub fn write_fully<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<usize> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match writer.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "channel accepted no bytes",
                ))
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(offset)
}

fn closed_error() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "serial port is closed")
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()?.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("config", &self.config.to_string())
            .field("open", &self.file.is_some())
            .finish()
    }
}
