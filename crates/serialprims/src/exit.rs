use std::fmt;
use std::io;

use serialprims_frame::FrameError;
use serialprims_port::PortError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Local I/O failures (payload files, stdout).
pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut => TIMEOUT,
        io::ErrorKind::InvalidData => DATA_INVALID,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// I/O failures on the serial device itself.
fn device_io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut => TIMEOUT,
        _ => PORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn port_error(context: &str, err: PortError) -> CliError {
    match &err {
        PortError::Open { source, .. } | PortError::Configure { source, .. } => {
            let mut mapped = device_io_error(context, source);
            mapped.message = format!("{context}: {err}");
            mapped
        }
        PortError::UnsupportedBaudRate(_)
        | PortError::UnsupportedDataBits(_)
        | PortError::UnsupportedStopBits(_)
        | PortError::UnsupportedParity(_) => CliError::usage(format!("{context}: {err}")),
        PortError::Io(source) => device_io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidRequest(_) => CliError::usage(format!("{context}: {err}")),
        FrameError::Io(source) => device_io_error(context, &source),
        FrameError::Port(err) => port_error(context, err),
    }
}
