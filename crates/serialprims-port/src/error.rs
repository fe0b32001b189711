use std::path::PathBuf;

/// Errors that can occur in serial port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Failed to open the device at the specified address.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The device was opened but could not be configured.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate is not one of the standard rates.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// Data bits must be 5, 6, 7 or 8.
    #[error("unsupported data bits: {0}")]
    UnsupportedDataBits(u8),

    /// Stop bits must be 1 or 2.
    #[error("unsupported stop bits: {0}")]
    UnsupportedStopBits(u8),

    /// Unknown parity name.
    #[error("unsupported parity: {0}")]
    UnsupportedParity(String),

    /// An I/O error occurred on the open port.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortError {
    /// True for errors raised while opening or configuring the device.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, PortError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, PortError>;
