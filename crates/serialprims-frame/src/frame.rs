use std::time::Duration;

use bytes::Bytes;

use crate::backoff::BackoffSchedule;

/// Default separator for line reads.
pub const DEFAULT_SEPARATOR: &[u8] = b"\n";

/// Default timeout for [`read_line`](crate::FrameReader::read_line).
pub const DEFAULT_LINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra polls attempted after a separator or keyword match.
pub const DEFAULT_DRAIN_ATTEMPTS: usize = 8;

/// Extra polls attempted after a timeout.
pub const DEFAULT_TIMEOUT_DRAIN_ATTEMPTS: usize = 2;

/// Upper bound on bytes taken after a keyword in [`KeywordContinuation::Capture`] mode.
pub const DEFAULT_CAPTURE_BUDGET: usize = 4096;

/// Largest single read issued against the channel.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Why a read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// The separator at this index (into the request's separators) matched.
    Separator(usize),
    /// The stop keyword at this index matched.
    Keyword(usize),
    /// The length limit was reached.
    Limit,
    /// The deadline passed first; the frame holds whatever was accumulated.
    Timeout,
}

/// A frame read from the channel.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Trimmed text (or the raw bytes as text when trimming was not requested).
    pub text: String,
    /// Every byte consumed for this frame, including separators and drained padding.
    pub raw: Bytes,
    pub terminator: Terminator,
}

impl Frame {
    pub fn timed_out(&self) -> bool {
        self.terminator == Terminator::Timeout
    }

    /// True when no byte at all was consumed.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// What happens to bytes that follow a stop keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordContinuation {
    /// Only whitespace padding joins the frame; the first other byte is
    /// deferred to the next read.
    #[default]
    Defer,
    /// Every immediately-available byte joins the frame, until the channel
    /// runs dry, a separator matches, the limit or the capture budget is hit.
    Capture,
}

/// Parameters of a single read.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    /// Candidate terminators. At least one, none empty.
    pub separators: Vec<Bytes>,
    /// Suffixes that end the frame without being stripped.
    pub stop_keywords: Vec<Bytes>,
    /// Hard cutoff on frame length.
    pub limit: Option<usize>,
    pub timeout: Duration,
    /// Strip trailing separators and carriage returns from `Frame::text`.
    pub trim: bool,
    /// Consume trailing whitespace after a match.
    pub drain: bool,
}

impl FrameRequest {
    /// A request terminated by `separator`.
    pub fn new(separator: impl AsRef<[u8]>, timeout: Duration) -> Self {
        Self {
            separators: vec![Bytes::copy_from_slice(separator.as_ref())],
            stop_keywords: Vec::new(),
            limit: None,
            timeout,
            trim: true,
            drain: true,
        }
    }

    /// A newline-terminated request.
    pub fn line(timeout: Duration) -> Self {
        Self::new(DEFAULT_SEPARATOR, timeout)
    }

    /// Replace the separators.
    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.separators = separators
            .into_iter()
            .map(|s| Bytes::copy_from_slice(s.as_ref()))
            .collect();
        self
    }

    pub fn keyword(mut self, keyword: impl AsRef<[u8]>) -> Self {
        self.stop_keywords
            .push(Bytes::copy_from_slice(keyword.as_ref()));
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.stop_keywords
            .extend(keywords.into_iter().map(|k| Bytes::copy_from_slice(k.as_ref())));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }
}

/// Configuration for the frame reader.
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Bytes requested per channel read. 1 reads byte by byte.
    pub chunk_size: usize,
    /// Extra polls after a separator or keyword match.
    pub drain_attempts: usize,
    /// Extra polls after a timeout.
    pub timeout_drain_attempts: usize,
    pub keyword_continuation: KeywordContinuation,
    /// Bytes accepted after a keyword in capture mode.
    pub capture_budget: usize,
    pub backoff: BackoffSchedule,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            drain_attempts: DEFAULT_DRAIN_ATTEMPTS,
            timeout_drain_attempts: DEFAULT_TIMEOUT_DRAIN_ATTEMPTS,
            keyword_continuation: KeywordContinuation::Defer,
            capture_budget: DEFAULT_CAPTURE_BUDGET,
            backoff: BackoffSchedule::default(),
        }
    }
}

/// Trailing padding consumed by the drain step.
pub fn is_padding(byte: u8) -> bool {
    matches!(byte, b'\r' | b'\n' | b' ' | b'\t')
}

/// Strip configured separators and a carriage return from the end of a
/// frame's content.
///
/// `content` must not include bytes appended by the drain; whitespace that
/// precedes the separator belongs to the frame and is kept. Stripping repeats
/// until neither a separator nor `\r` is left at the end, so
/// `trim_frame(trim_frame(x)) == trim_frame(x)`.
pub fn trim_frame<'a>(content: &'a [u8], separators: &[Bytes]) -> &'a [u8] {
    let mut end = content.len();
    loop {
        let current = &content[..end];
        if let Some(sep) = separators
            .iter()
            .find(|sep| !sep.is_empty() && current.ends_with(sep))
        {
            end -= sep.len();
        } else if current.last() == Some(&b'\r') {
            end -= 1;
        } else {
            break;
        }
    }
    &content[..end]
}
