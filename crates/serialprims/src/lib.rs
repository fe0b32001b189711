//! Serial port primitives.
//!
//! serialprims opens serial devices in raw, non-blocking mode and reads
//! delimited frames from them under a deadline, without losing bytes that
//! arrive after a frame ends.
//!
//! # Crate Structure
//!
//! - [`port`]: device access and line settings (termios on Unix, COM ports on Windows)
//! - [`frame`]: separator, keyword and limit based frame reading with backoff polling
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use serialprims::frame::{FrameReader, FrameRequest, ReadConfig};
//! use serialprims::port::PortConfig;
//!
//! # fn main() -> serialprims::frame::Result<()> {
//! let mut reader = FrameReader::open("/dev/ttyUSB0", PortConfig::default(), ReadConfig::default())?;
//! let request = FrameRequest::line(Duration::from_secs(2)).separators(["\n", "/"]);
//! let frame = reader.read_frame(&request)?;
//! println!("{}", frame.text);
//! # Ok(())
//! # }
//! ```

/// Re-export port types.
pub mod port {
    pub use serialprims_port::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialprims_frame::*;
}
