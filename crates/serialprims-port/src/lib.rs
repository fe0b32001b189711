//! Raw serial port access.
//!
//! Provides the lowest layer of serialprims: open a device by address,
//! apply line settings (baud rate, data bits, parity, stop bits), and
//! exchange bytes without ever waiting for data that has not arrived yet.
//! - termios on Linux/macOS
//! - DCB + COMMTIMEOUTS on Windows
//!
//! Everything else builds on the [`SerialPort`] type provided here, which
//! implements `Read + Write`.

pub mod config;
pub mod error;
pub mod port;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

pub use config::{BaudRate, DataBits, Parity, PortConfig, StopBits, STANDARD_BAUD_RATES};
pub use error::{PortError, Result};
pub use port::{write_fully, SerialPort};
