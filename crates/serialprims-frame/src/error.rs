/// Errors that can occur while reading or writing frames.
///
/// A timeout is not an error: it is reported through
/// [`Terminator::Timeout`](crate::Terminator::Timeout) on the returned frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame request cannot be satisfied (no separator, empty pattern, zero limit).
    #[error("invalid frame request: {0}")]
    InvalidRequest(&'static str),

    /// An I/O error occurred while polling or writing the channel.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Port(#[from] serialprims_port::PortError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
