use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use serialprims_port::{PortConfig, SerialPort};
use tracing::{debug, trace};

use crate::accumulator::ByteAccumulator;
use crate::backoff::{Clock, SystemClock};
use crate::error::{FrameError, Result};
use crate::frame::{
    is_padding, trim_frame, Frame, FrameRequest, KeywordContinuation, ReadConfig, Terminator,
    DEFAULT_LINE_TIMEOUT, DEFAULT_SEPARATOR, MAX_CHUNK_SIZE,
};
use crate::policy::{Termination, TerminationPolicy};

/// State a [`FrameReader`] carries from one read to the next.
#[derive(Debug, Default, Clone)]
pub struct ReaderState {
    lookahead: BytesMut,
    empty_polls: u32,
    deferred: u64,
}

impl ReaderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes already read that belong to the next frame.
    pub fn lookahead(&self) -> &[u8] {
        &self.lookahead
    }

    /// Consecutive polls that returned no data.
    pub fn empty_polls(&self) -> u32 {
        self.empty_polls
    }

    /// Number of times a drain found data instead of padding and deferred it.
    pub fn deferred(&self) -> u64 {
        self.deferred
    }
}

/// Reads delimited frames from a non-blocking `Read` channel.
///
/// `Ok(0)`, `WouldBlock` and `Interrupted` from the channel all mean "nothing
/// yet": the reader backs off and polls again until a rule matches or the
/// request's deadline passes. Any other I/O error aborts the read.
pub struct FrameReader<T, C = SystemClock> {
    inner: T,
    state: ReaderState,
    config: ReadConfig,
    clock: C,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReadConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: ReadConfig) -> Self {
        Self::with_clock(inner, config, SystemClock)
    }
}

impl FrameReader<SerialPort> {
    /// Open a serial port and wrap it in a reader.
    pub fn open(path: impl AsRef<Path>, port: PortConfig, config: ReadConfig) -> Result<Self> {
        let port = SerialPort::open(path, port)?;
        Ok(Self::with_config(port, config))
    }
}

impl<T: Read, C: Clock> FrameReader<T, C> {
    /// Create a frame reader that sleeps and tells time through `clock`.
    pub fn with_clock(inner: T, config: ReadConfig, clock: C) -> Self {
        Self {
            inner,
            state: ReaderState::default(),
            config,
            clock,
        }
    }

    /// Resume with state taken from an earlier reader on the same channel.
    pub fn with_state(mut self, state: ReaderState) -> Self {
        self.state = state;
        self
    }

    /// Read the next frame.
    ///
    /// Returns when a separator, stop keyword or the limit matches, or when
    /// `request.timeout` elapses. A timeout is reported through
    /// [`Frame::timed_out`], never as an error.
    pub fn read_frame(&mut self, request: &FrameRequest) -> Result<Frame> {
        let policy =
            TerminationPolicy::new(&request.separators, &request.stop_keywords, request.limit)?;
        let deadline = self
            .clock
            .now()
            .checked_add(request.timeout)
            .ok_or(FrameError::InvalidRequest("timeout is too large"))?;

        let mut buffer = ByteAccumulator::new();

        loop {
            let now = self.clock.now();
            if now >= deadline {
                let content_end = buffer.len();
                if request.drain {
                    self.drain_padding(&mut buffer, &policy, self.config.timeout_drain_attempts)?;
                }
                debug!(len = buffer.len(), "frame read timed out");
                let end = FrameEnd::new(Terminator::Timeout, content_end);
                return Ok(finish(buffer, end, &policy, request.trim));
            }

            let Some(byte) = self.next_byte()? else {
                self.state.empty_polls = self.state.empty_polls.saturating_add(1);
                let delay = self.config.backoff.delay(self.state.empty_polls);
                self.clock
                    .sleep(delay.min(deadline.saturating_duration_since(now)));
                continue;
            };

            buffer.push(byte);
            self.state.empty_polls = 0;

            let matched = policy.evaluate(buffer.as_bytes());
            if !matched.is_match() {
                continue;
            }
            let end = self.complete(&mut buffer, &policy, matched, request.drain)?;

            trace!(len = buffer.len(), terminator = ?end.terminator, "frame complete");
            return Ok(finish(buffer, end, &policy, request.trim));
        }
    }

    /// Drain or capture after a match. Records where the matched data ends
    /// so trimming never reaches into bytes the frame itself carried.
    fn complete(
        &mut self,
        buffer: &mut ByteAccumulator,
        policy: &TerminationPolicy,
        matched: Termination,
        drain: bool,
    ) -> Result<FrameEnd> {
        let content_end = buffer.len();
        let terminator = match matched {
            Termination::Keyword(index)
                if drain && self.config.keyword_continuation == KeywordContinuation::Capture =>
            {
                return self.capture(buffer, policy, index);
            }
            Termination::Separator(index) => Terminator::Separator(index),
            Termination::Keyword(index) => Terminator::Keyword(index),
            // Limit frames are never drained.
            Termination::Limit | Termination::Pending => {
                return Ok(FrameEnd::new(Terminator::Limit, content_end));
            }
        };

        if drain {
            self.drain_padding(buffer, policy, self.config.drain_attempts)?;
        }
        Ok(FrameEnd::new(terminator, content_end))
    }

    /// Read a newline-terminated line with the default 60 second timeout.
    pub fn read_line(&mut self) -> Result<Frame> {
        self.read_until(DEFAULT_SEPARATOR, DEFAULT_LINE_TIMEOUT)
    }

    /// Read up to a single separator.
    pub fn read_until(&mut self, separator: impl AsRef<[u8]>, timeout: Duration) -> Result<Frame> {
        self.read_frame(&FrameRequest::new(separator, timeout))
    }

    /// Classic `gets`: stop at `separator` or `limit` bytes, no draining, no trimming.
    pub fn gets(
        &mut self,
        separator: impl AsRef<[u8]>,
        limit: Option<usize>,
        timeout: Duration,
    ) -> Result<Frame> {
        let mut request = FrameRequest::new(separator, timeout).trim(false).drain(false);
        request.limit = limit;
        self.read_frame(&request)
    }

    /// Iterate over successive frames for the same request.
    ///
    /// Timed-out frames are yielded like any other; the iterator ends after
    /// the first error.
    pub fn frames<'a>(&'a mut self, request: &'a FrameRequest) -> Frames<'a, T, C> {
        Frames {
            reader: self,
            request,
            failed: false,
        }
    }

    /// Consume trailing whitespace without sleeping. The first byte that is
    /// not padding stays in the lookahead for the next frame.
    fn drain_padding(
        &mut self,
        buffer: &mut ByteAccumulator,
        policy: &TerminationPolicy,
        attempts: usize,
    ) -> Result<()> {
        for _ in 0..attempts {
            if policy.limit_reached(buffer.len()) {
                break;
            }
            let fetched = self.state.lookahead.is_empty();
            match self.peek_byte()? {
                None => break,
                Some(byte) if is_padding(byte) => {
                    self.state.lookahead.advance(1);
                    buffer.push(byte);
                }
                Some(byte) if fetched => {
                    self.state.deferred = self.state.deferred.saturating_add(1);
                    debug!(byte, "data after terminator; deferring to next frame");
                    break;
                }
                // Already queued before this drain; counted when it arrived.
                Some(_) => break,
            }
        }
        Ok(())
    }

    /// Take every immediately available byte after a keyword. A separator
    /// reached on the way ends the frame as a separator match.
    fn capture(
        &mut self,
        buffer: &mut ByteAccumulator,
        policy: &TerminationPolicy,
        keyword: usize,
    ) -> Result<FrameEnd> {
        for _ in 0..self.config.capture_budget {
            if policy.limit_reached(buffer.len()) {
                return Ok(FrameEnd::new(Terminator::Limit, buffer.len()));
            }
            let Some(byte) = self.next_byte()? else {
                break;
            };
            buffer.push(byte);
            if let Some(index) = policy.separator_match(buffer.as_bytes()) {
                let content_end = buffer.len();
                self.drain_padding(buffer, policy, self.config.drain_attempts)?;
                return Ok(FrameEnd::new(Terminator::Separator(index), content_end));
            }
        }
        Ok(FrameEnd::new(Terminator::Keyword(keyword), buffer.len()))
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.state.lookahead.advance(1);
        }
        Ok(byte)
    }

    /// Next byte without consuming it; polls the channel once when the
    /// lookahead is empty.
    fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.state.lookahead.is_empty() {
            self.fill()?;
        }
        Ok(self.state.lookahead.first().copied())
    }

    /// Read up to `chunk_size` bytes straight into the tail of the lookahead.
    fn fill(&mut self) -> Result<usize> {
        let want = self.config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let start = self.state.lookahead.len();
        self.state.lookahead.resize(start + want, 0);

        let read = match self.inner.read(&mut self.state.lookahead[start..]) {
            Ok(n) => n.min(want),
            Err(err) if err.kind() == ErrorKind::Interrupted => 0,
            Err(err) if err.kind() == ErrorKind::WouldBlock => 0,
            Err(err) => {
                self.state.lookahead.truncate(start);
                return Err(FrameError::Io(err));
            }
        };
        self.state.lookahead.truncate(start + read);
        Ok(read)
    }

    /// Reader state (lookahead and poll counters).
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner channel.
    ///
    /// Any lookahead is lost; use [`into_parts`](Self::into_parts) to keep it.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Consume the reader and return the channel together with its state.
    pub fn into_parts(self) -> (T, ReaderState) {
        (self.inner, self.state)
    }

    /// Replace the configuration for subsequent reads.
    pub fn set_config(&mut self, config: ReadConfig) {
        self.config = config;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &ReadConfig {
        &self.config
    }
}

/// How a read ended and where the frame's own bytes stop. Anything past
/// `content_end` was appended by the drain.
#[derive(Debug, Clone, Copy)]
struct FrameEnd {
    terminator: Terminator,
    content_end: usize,
}

impl FrameEnd {
    fn new(terminator: Terminator, content_end: usize) -> Self {
        Self {
            terminator,
            content_end,
        }
    }
}

fn finish(
    buffer: ByteAccumulator,
    end: FrameEnd,
    policy: &TerminationPolicy,
    trim: bool,
) -> Frame {
    let raw = buffer.into_bytes();
    let text = match end.terminator {
        // A limit is a hard cutoff: the text is exactly the bytes read.
        Terminator::Limit => String::from_utf8_lossy(&raw).into_owned(),
        _ if trim => {
            let content = &raw[..end.content_end.min(raw.len())];
            String::from_utf8_lossy(trim_frame(content, policy.separators())).into_owned()
        }
        _ => String::from_utf8_lossy(&raw).into_owned(),
    };
    Frame {
        text,
        raw,
        terminator: end.terminator,
    }
}

/// Iterator returned by [`FrameReader::frames`].
pub struct Frames<'a, T, C> {
    reader: &'a mut FrameReader<T, C>,
    request: &'a FrameRequest,
    failed: bool,
}

impl<T: Read, C: Clock> Iterator for Frames<'_, T, C> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.reader.read_frame(self.request);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::time::Instant;

    use super::*;
    use crate::frame::{DEFAULT_DRAIN_ATTEMPTS, DEFAULT_TIMEOUT_DRAIN_ATTEMPTS};

    /// Deterministic clock: sleeping advances time instantly.
    struct ManualClock {
        now: Cell<Instant>,
        slept: Cell<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
                slept: Cell::new(Duration::ZERO),
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
            self.slept.set(self.slept.get() + duration);
        }
    }

    /// Channel that hands out scripted deliveries. An empty delivery is one
    /// empty poll; a delivery larger than the read buffer is split.
    #[derive(Debug, Default)]
    struct ScriptedChannel {
        deliveries: VecDeque<Vec<u8>>,
        reads: usize,
    }

    impl ScriptedChannel {
        fn new(deliveries: &[&[u8]]) -> Self {
            Self {
                deliveries: deliveries.iter().map(|d| d.to_vec()).collect(),
                reads: 0,
            }
        }
    }

    impl Read for ScriptedChannel {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            let Some(front) = self.deliveries.front_mut() else {
                return Ok(0);
            };
            let n = front.len().min(buf.len());
            buf[..n].copy_from_slice(&front[..n]);
            front.drain(..n);
            if front.is_empty() {
                self.deliveries.pop_front();
            }
            Ok(n)
        }
    }

    fn reader(
        channel: ScriptedChannel,
        clock: &ManualClock,
    ) -> FrameReader<ScriptedChannel, &ManualClock> {
        FrameReader::with_clock(channel, ReadConfig::default(), clock)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn reads_line_and_trims_separator() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"hello world\n"]), &clock);

        let frame = reader.read_until("\n", secs(1)).unwrap();
        assert_eq!(frame.text, "hello world");
        assert_eq!(frame.raw.as_ref(), b"hello world\n");
        assert_eq!(frame.terminator, Terminator::Separator(0));
        assert!(!frame.timed_out());
    }

    #[test]
    fn multiple_separators_stop_at_first_present() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"test data\n"]), &clock);

        let request = FrameRequest::line(secs(1)).separators(["\n", "/"]);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.text, "test data");
        assert_eq!(frame.terminator, Terminator::Separator(0));
    }

    #[test]
    fn protocol_terminator_is_stripped() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"\\RESPONSE/"]), &clock);

        let frame = reader.read_until("/", secs(1)).unwrap();
        assert_eq!(frame.text, "\\RESPONSE");
    }

    #[test]
    fn trailing_padding_is_drained_and_next_byte_deferred() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"OK/\r\nX", b"YZ\n"]), &clock);

        let first = reader.read_until("/", secs(1)).unwrap();
        assert_eq!(first.text, "OK");
        assert_eq!(first.raw.as_ref(), b"OK/\r\n");
        assert_eq!(reader.state().lookahead(), b"X");
        assert_eq!(reader.state().deferred(), 1);

        let second = reader.read_until("\n", secs(1)).unwrap();
        assert_eq!(second.raw.as_ref(), b"XYZ\n");
        assert_eq!(second.text, "XYZ");
        assert!(reader.state().lookahead().is_empty());
    }

    #[test]
    fn deferred_separator_byte_ends_next_frame_immediately() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"A/ /"]), &clock);

        let first = reader.read_until("/", secs(1)).unwrap();
        assert_eq!(first.raw.as_ref(), b"A/ ");
        let second = reader.read_until("/", secs(1)).unwrap();
        assert_eq!(second.raw.as_ref(), b"/");
        assert_eq!(second.text, "");
        assert_eq!(second.terminator, Terminator::Separator(0));
    }

    #[test]
    fn same_text_regardless_of_fragmentation() {
        let stream = b"first line\r\nsecond/third\nfourth\n";
        let request = FrameRequest::line(secs(5)).separators(["\n", "/"]);

        let read_all = |deliveries: Vec<Vec<u8>>, chunk_size: usize| {
            let clock = ManualClock::new();
            let refs: Vec<&[u8]> = deliveries.iter().map(Vec::as_slice).collect();
            let config = ReadConfig {
                chunk_size,
                ..ReadConfig::default()
            };
            let mut reader =
                FrameReader::with_clock(ScriptedChannel::new(&refs), config, &clock);
            (0..4)
                .map(|_| reader.read_frame(&request).unwrap().text)
                .collect::<Vec<_>>()
        };

        let whole = read_all(vec![stream.to_vec()], 1);
        assert_eq!(whole, vec!["first line", "second", "third", "fourth"]);

        let bytewise: Vec<Vec<u8>> = stream.iter().map(|b| vec![*b]).collect();
        assert_eq!(read_all(bytewise, 1), whole);

        let mut gappy = Vec::new();
        for (i, piece) in stream.chunks(3).enumerate() {
            gappy.push(piece.to_vec());
            if i % 2 == 0 {
                gappy.push(Vec::new());
            }
        }
        assert_eq!(read_all(gappy.clone(), 1), whole);
        assert_eq!(read_all(gappy, 16), whole);
        assert_eq!(read_all(vec![stream.to_vec()], 64), whole);
    }

    #[test]
    fn chunked_arrival_accumulates() {
        let clock = ManualClock::new();
        let channel = ScriptedChannel::new(&[b"chunk1", b"", b"", b"chunk2", b"", b"\n"]);
        let mut reader = reader(channel, &clock);

        let frame = reader.read_until("\n", secs(2)).unwrap();
        assert_eq!(frame.text, "chunk1chunk2");
        assert_eq!(reader.state().empty_polls(), 0);
    }

    #[test]
    fn limit_cuts_frame_without_draining() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"no yes \n hello"]), &clock);

        let request = FrameRequest::line(secs(1)).limit(4);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.text, "no y");
        assert_eq!(frame.terminator, Terminator::Limit);
        assert!(reader.state().lookahead().is_empty());

        let rest = reader.read_line().unwrap();
        assert_eq!(rest.text, "es ");
        assert_eq!(rest.raw.as_ref(), b"es \n ");
    }

    #[test]
    fn limit_frame_keeps_trailing_whitespace() {
        let mut reader = FrameReader::new(Cursor::new(b"ab  cd\n".to_vec()));

        let request = FrameRequest::line(Duration::from_millis(50)).limit(4);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.terminator, Terminator::Limit);
        assert_eq!(frame.raw.as_ref(), b"ab  ");
        assert_eq!(frame.text, "ab  ");
    }

    #[test]
    fn whitespace_before_separator_is_data() {
        let mut reader = FrameReader::new(Cursor::new(b"value \t\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().text, "value \t");

        let mut reader = FrameReader::new(Cursor::new(b"value \t\r\n next".to_vec()));
        let frame = reader.read_line().unwrap();
        assert_eq!(frame.text, "value \t");
        assert_eq!(frame.raw.as_ref(), b"value \t\r\n ");
    }

    #[test]
    fn drained_padding_is_never_part_of_text() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"A /\t \r\n"]), &clock);

        let frame = reader.read_until("/", secs(1)).unwrap();
        assert_eq!(frame.raw.as_ref(), b"A /\t \r\n");
        assert_eq!(frame.text, "A ");
    }

    #[test]
    fn drain_stops_at_attempt_cap() {
        let clock = ManualClock::new();
        let mut stream = b"OK\n".to_vec();
        stream.extend_from_slice(&[b' '; 12]);
        stream.extend_from_slice(b"next\n");
        let mut reader = reader(ScriptedChannel::new(&[stream.as_slice()]), &clock);

        let first = reader.read_line().unwrap();
        assert_eq!(first.raw.len(), 3 + DEFAULT_DRAIN_ATTEMPTS);
        assert_eq!(first.text, "OK");
        assert_eq!(reader.state().deferred(), 0);

        let second = reader.read_line().unwrap();
        assert_eq!(second.raw.as_ref(), b"    next\n");
        assert_eq!(second.text, "    next");
    }

    #[test]
    fn capture_stops_at_budget() {
        let clock = ManualClock::new();
        let config = ReadConfig {
            keyword_continuation: KeywordContinuation::Capture,
            capture_budget: 5,
            ..ReadConfig::default()
        };
        let mut reader = FrameReader::with_clock(
            ScriptedChannel::new(&[b"OK123456789\n"]),
            config,
            &clock,
        );

        let request = FrameRequest::line(secs(1)).keyword("OK");
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.terminator, Terminator::Keyword(0));
        assert_eq!(frame.raw.as_ref(), b"OK12345");
        assert_eq!(frame.text, "OK12345");

        assert_eq!(reader.read_frame(&request).unwrap().text, "6789");
    }

    #[test]
    fn timeout_drain_stops_after_two_polls() {
        let clock = ManualClock::new();
        let channel = ScriptedChannel::new(&[b"abc", b"", b" \t\r\n"]);
        let mut reader = reader(channel, &clock);

        let frame = reader.read_until("/", Duration::from_millis(1)).unwrap();
        assert!(frame.timed_out());
        assert_eq!(frame.raw.len(), 3 + DEFAULT_TIMEOUT_DRAIN_ATTEMPTS);
        assert_eq!(frame.raw.as_ref(), b"abc \t");
        assert_eq!(frame.text, "abc");

        let rest = reader.read_line().unwrap();
        assert_eq!(rest.raw.as_ref(), b"\r\n");
        assert_eq!(rest.text, "");
    }

    #[test]
    fn queued_byte_is_counted_once() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"OK/X"]), &clock);

        reader.read_until("/", secs(1)).unwrap();
        assert_eq!(reader.state().lookahead(), b"X");
        assert_eq!(reader.state().deferred(), 1);

        let frame = reader.read_until("/", Duration::ZERO).unwrap();
        assert!(frame.timed_out());
        assert_eq!(reader.state().lookahead(), b"X");
        assert_eq!(reader.state().deferred(), 1);
    }

    #[test]
    fn fill_reads_only_the_chunk_size() {
        let clock = ManualClock::new();
        let config = ReadConfig {
            chunk_size: 4,
            ..ReadConfig::default()
        };
        let mut reader =
            FrameReader::with_clock(ScriptedChannel::new(&[b"a\nbcdefgh"]), config, &clock);

        assert_eq!(reader.read_line().unwrap().text, "a");
        assert_eq!(reader.state().lookahead(), b"bc");
        assert_eq!(reader.get_ref().reads, 1);
    }

    #[test]
    fn limit_applies_before_later_separator() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"no yes END hello"]), &clock);

        let frame = reader.gets("END", Some(4), secs(1)).unwrap();
        assert_eq!(frame.text, "no y");

        let mut reader = FrameReader::with_clock(
            ScriptedChannel::new(&[b"no yes END hello"]),
            ReadConfig::default(),
            &clock,
        );
        let frame = reader.gets("END", Some(20), secs(1)).unwrap();
        assert_eq!(frame.text, "no yes END");
    }

    #[test]
    fn drain_never_grows_past_limit() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"ab\n  "]), &clock);

        let request = FrameRequest::line(secs(1)).limit(3);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.raw.as_ref(), b"ab\n");
        assert_eq!(frame.terminator, Terminator::Separator(0));
    }

    #[test]
    fn gets_keeps_separator_and_leaves_rest_in_channel() {
        let clock = ManualClock::new();
        let mut reader = reader(
            ScriptedChannel::new(&[b"Something \n Something else \n\n and other stuff"]),
            &clock,
        );

        let frame = reader.gets("\n\n", None, secs(1)).unwrap();
        assert_eq!(frame.text, "Something \n Something else \n\n");
        assert!(reader.state().lookahead().is_empty());

        let line = reader.gets("\n", None, secs(1)).unwrap();
        assert!(line.timed_out());
        assert_eq!(line.text, " and other stuff");
    }

    #[test]
    fn keyword_defers_following_data_by_default() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"some data ERROR more data"]), &clock);

        let request = FrameRequest::line(secs(1)).keywords(["ERROR", "OK"]);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.text, "some data ERROR");
        assert_eq!(frame.raw.as_ref(), b"some data ERROR ");
        assert_eq!(frame.terminator, Terminator::Keyword(0));
        assert_eq!(reader.state().lookahead(), b"m");

        let rest = reader.read_frame(&request).unwrap();
        assert!(rest.timed_out());
        assert_eq!(rest.text, "more data");
    }

    #[test]
    fn keyword_capture_takes_available_continuation() {
        let clock = ManualClock::new();
        let config = ReadConfig {
            keyword_continuation: KeywordContinuation::Capture,
            ..ReadConfig::default()
        };
        let mut reader = FrameReader::with_clock(
            ScriptedChannel::new(&[b"command result OK trailing", b"", b"late\n"]),
            config,
            &clock,
        );

        let request = FrameRequest::line(secs(1)).keywords(["ERROR", "OK"]);
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.text, "command result OK trailing");
        assert_eq!(frame.terminator, Terminator::Keyword(1));

        let late = reader.read_frame(&request).unwrap();
        assert_eq!(late.text, "late");
    }

    #[test]
    fn keyword_capture_stops_at_separator() {
        let clock = ManualClock::new();
        let config = ReadConfig {
            keyword_continuation: KeywordContinuation::Capture,
            ..ReadConfig::default()
        };
        let mut reader = FrameReader::with_clock(
            ScriptedChannel::new(&[b"ERROR code 7\r\nNEXT\n"]),
            config,
            &clock,
        );

        let request = FrameRequest::line(secs(1)).keyword("ERROR");
        let frame = reader.read_frame(&request).unwrap();
        assert_eq!(frame.text, "ERROR code 7");
        assert_eq!(frame.terminator, Terminator::Separator(0));
        assert_eq!(reader.read_frame(&request).unwrap().text, "NEXT");
    }

    #[test]
    fn timeout_returns_partial_frame() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"partial"]), &clock);

        let frame = reader.read_until("\n", secs(1)).unwrap();
        assert!(frame.timed_out());
        assert_eq!(frame.text, "partial");
    }

    #[test]
    fn timeout_on_silent_channel_sleeps_exactly_to_deadline() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut reader = reader(ScriptedChannel::default(), &clock);

        let frame = reader.read_until("\n", secs(1)).unwrap();
        assert!(frame.timed_out());
        assert!(frame.is_empty());
        assert_eq!(frame.text, "");
        assert_eq!(clock.now() - start, secs(1));
        assert_eq!(clock.slept.get(), secs(1));
        assert!(reader.state().empty_polls() > 100);
    }

    #[test]
    fn timeout_drains_whitespace_residue() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"abc", b"", b"\r\n"]), &clock);

        let frame = reader.read_until("/", Duration::from_millis(1)).unwrap();
        assert!(frame.timed_out());
        assert_eq!(frame.raw.as_ref(), b"abc\r\n");
        assert_eq!(frame.text, "abc");
    }

    #[test]
    fn zero_timeout_returns_without_polling() {
        let clock = ManualClock::new();
        let mut reader = FrameReader::with_clock(
            ScriptedChannel::new(&[b"data\n"]),
            ReadConfig {
                timeout_drain_attempts: 0,
                ..ReadConfig::default()
            },
            &clock,
        );

        let frame = reader.read_until("\n", Duration::ZERO).unwrap();
        assert!(frame.timed_out());
        assert_eq!(reader.get_ref().reads, 0);
    }

    #[test]
    fn real_time_timeout_is_bounded() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let timeout = Duration::from_millis(200);

        let start = Instant::now();
        let frame = reader.read_until("\n", timeout).unwrap();
        let elapsed = start.elapsed();

        assert!(frame.timed_out());
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(150), "took {elapsed:?}");
    }

    #[test]
    fn io_error_aborts_read() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::BrokenPipe))
            }
        }

        let mut reader = FrameReader::new(Broken);
        let err = reader.read_until("\n", secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn would_block_and_interrupted_are_empty_polls() {
        struct Flaky {
            calls: usize,
            data: Cursor<Vec<u8>>,
        }

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.calls += 1;
                match self.calls {
                    1 => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                    2 => Err(std::io::Error::from(ErrorKind::Interrupted)),
                    _ => self.data.read(buf),
                }
            }
        }

        let clock = ManualClock::new();
        let flaky = Flaky {
            calls: 0,
            data: Cursor::new(b"ok\n".to_vec()),
        };
        let mut reader = FrameReader::with_clock(flaky, ReadConfig::default(), &clock);
        let frame = reader.read_line().unwrap();
        assert_eq!(frame.text, "ok");
        assert!(clock.slept.get() > Duration::ZERO);
    }

    #[test]
    fn invalid_request_fails_before_io() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"x\n"]), &clock);

        let request = FrameRequest::line(secs(1)).separators(Vec::<&[u8]>::new());
        assert!(matches!(
            reader.read_frame(&request),
            Err(FrameError::InvalidRequest(_))
        ));
        assert_eq!(reader.get_ref().reads, 0);
    }

    #[test]
    fn state_survives_into_parts() {
        let clock = ManualClock::new();
        let mut first = reader(ScriptedChannel::new(&[b"one\nt", b"wo\n"]), &clock);
        assert_eq!(first.read_line().unwrap().text, "one");

        let (channel, state) = first.into_parts();
        assert_eq!(state.lookahead(), b"t");

        let mut second = FrameReader::with_clock(channel, ReadConfig::default(), &clock)
            .with_state(state);
        assert_eq!(second.read_line().unwrap().text, "two");
    }

    #[test]
    fn frames_iterator_yields_successive_frames() {
        let clock = ManualClock::new();
        let mut reader = reader(ScriptedChannel::new(&[b"a\nb\nc\n"]), &clock);

        let request = FrameRequest::line(secs(1));
        let texts: Vec<String> = reader
            .frames(&request)
            .take(3)
            .map(|frame| frame.unwrap().text)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn frames_iterator_stops_after_error() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let request = FrameRequest::line(secs(1)).limit(0);

        let results: Vec<_> = reader.frames(&request).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
