//! Deadline-bounded frame reading over non-blocking byte channels.
//!
//! A channel such as a serial port delivers bytes in arbitrary fragments. A
//! [`FrameReader`] polls it, accumulates bytes and ends a frame when:
//! - the buffer ends with one of the request's separators,
//! - the buffer ends with a stop keyword,
//! - the buffer reaches the request's length limit, or
//! - the request's timeout elapses (a partial frame, not an error).
//!
//! Whitespace following a match is drained into the same frame, and the
//! first byte of the next frame is kept in the reader's lookahead so it is
//! never lost.

pub mod accumulator;
pub mod backoff;
pub mod error;
pub mod frame;
pub mod policy;
pub mod reader;
pub mod writer;

pub use accumulator::ByteAccumulator;
pub use backoff::{BackoffSchedule, Clock, SystemClock, MIN_DELAY};
pub use error::{FrameError, Result};
pub use frame::{
    is_padding, trim_frame, Frame, FrameRequest, KeywordContinuation, ReadConfig, Terminator,
    DEFAULT_CAPTURE_BUDGET, DEFAULT_DRAIN_ATTEMPTS, DEFAULT_LINE_TIMEOUT, DEFAULT_SEPARATOR,
    DEFAULT_TIMEOUT_DRAIN_ATTEMPTS, MAX_CHUNK_SIZE,
};
pub use policy::{Termination, TerminationPolicy};
pub use reader::{FrameReader, Frames, ReaderState};
pub use writer::FrameWriter;
