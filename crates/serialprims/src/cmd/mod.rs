use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serialprims_frame::{FrameRequest, KeywordContinuation, ReadConfig};
use serialprims_port::{Parity, PortConfig};

use crate::exit::{port_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod listen;
pub mod parse;
pub mod read;
pub mod send;
pub mod version;

use parse::{parse_duration, parse_escapes};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read frames from a serial port and print them.
    Read(ReadArgs),
    /// Write a payload to a serial port, optionally waiting for a reply.
    Send(SendArgs),
    /// Print frames until interrupted.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Line settings shared by every command that opens a port.
#[derive(Args, Debug)]
pub struct PortArgs {
    /// Baud rate.
    #[arg(long, short = 'b', default_value_t = 9600, env = "SERIALPRIMS_BAUD")]
    pub baud: u32,
    /// Data bits (5-8).
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,
    /// Parity (none, even, odd).
    #[arg(long, default_value = "none")]
    pub parity: Parity,
    /// Stop bits (1 or 2).
    #[arg(long, default_value_t = 1)]
    pub stop_bits: u8,
}

impl PortArgs {
    pub fn port_config(&self) -> CliResult<PortConfig> {
        PortConfig::from_raw(self.baud, self.data_bits, self.parity, self.stop_bits)
            .map_err(|err| port_error("invalid port settings", err))
    }
}

/// Termination rules and reader tuning.
#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Frame separator; repeatable. Escapes: \n \r \t \\ \xHH. Default: \n.
    #[arg(long = "sep", value_name = "SEP")]
    pub separators: Vec<String>,
    /// Stop keyword that ends a frame and is kept in it; repeatable.
    #[arg(long = "keyword", value_name = "KEYWORD")]
    pub keywords: Vec<String>,
    /// Maximum frame length in bytes.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Per-frame timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Do not trim or drain: print frames exactly as read.
    #[arg(long)]
    pub raw_frames: bool,
    /// Keep bytes that arrive right after a stop keyword in the same frame.
    #[arg(long)]
    pub capture_after_keyword: bool,
    /// Bytes requested per poll.
    #[arg(long, default_value_t = 1)]
    pub chunk_size: usize,
}

impl FrameArgs {
    pub fn request(&self) -> CliResult<FrameRequest> {
        let timeout = parse_duration(&self.timeout)?;
        self.request_with_timeout(timeout)
    }

    pub fn request_with_timeout(&self, timeout: Duration) -> CliResult<FrameRequest> {
        let mut request = FrameRequest::line(timeout);
        if !self.separators.is_empty() {
            request = request.separators(escaped_all(&self.separators)?);
        }
        request = request.keywords(escaped_all(&self.keywords)?);
        if let Some(limit) = self.limit {
            request = request.limit(limit);
        }
        if self.raw_frames {
            request = request.trim(false).drain(false);
        }
        Ok(request)
    }

    pub fn read_config(&self) -> CliResult<ReadConfig> {
        if self.chunk_size == 0 {
            return Err(CliError::usage("--chunk-size must be greater than zero"));
        }
        let keyword_continuation = if self.capture_after_keyword {
            KeywordContinuation::Capture
        } else {
            KeywordContinuation::Defer
        };
        Ok(ReadConfig {
            chunk_size: self.chunk_size,
            keyword_continuation,
            ..ReadConfig::default()
        })
    }
}

fn escaped_all(values: &[String]) -> CliResult<Vec<Vec<u8>>> {
    values.iter().map(|value| parse_escapes(value)).collect()
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    pub path: PathBuf,
    #[command(flatten)]
    pub port: PortArgs,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Number of frames to read.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    pub path: PathBuf,
    #[command(flatten)]
    pub port: PortArgs,
    /// String payload (escapes allowed).
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Appended to the payload (e.g. "\r\n").
    #[arg(long)]
    pub line_ending: Option<String>,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Reply separator; repeatable. Default: \n.
    #[arg(long = "sep", value_name = "SEP")]
    pub separators: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    pub path: PathBuf,
    #[command(flatten)]
    pub port: PortArgs,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
