use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Outcome of evaluating the termination rules against the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No rule is satisfied yet.
    Pending,
    /// The buffer ends with the separator at this index.
    Separator(usize),
    /// The buffer ends with the stop keyword at this index.
    Keyword(usize),
    /// The buffer reached the length limit.
    Limit,
}

impl Termination {
    pub fn is_match(self) -> bool {
        !matches!(self, Termination::Pending)
    }
}

/// Validated set of termination rules for one read.
///
/// Separators are checked first, then stop keywords, then the limit. Any one
/// of them ends the frame.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    separators: Vec<Bytes>,
    stop_keywords: Vec<Bytes>,
    limit: Option<usize>,
}

impl TerminationPolicy {
    pub fn new(separators: &[Bytes], stop_keywords: &[Bytes], limit: Option<usize>) -> Result<Self> {
        if separators.is_empty() {
            return Err(FrameError::InvalidRequest("at least one separator is required"));
        }
        if separators.iter().any(|s| s.is_empty()) {
            return Err(FrameError::InvalidRequest("separators must not be empty"));
        }
        if stop_keywords.iter().any(|k| k.is_empty()) {
            return Err(FrameError::InvalidRequest("stop keywords must not be empty"));
        }
        if limit == Some(0) {
            return Err(FrameError::InvalidRequest("limit must be greater than zero"));
        }

        Ok(Self {
            separators: separators.to_vec(),
            stop_keywords: stop_keywords.to_vec(),
            limit,
        })
    }

    /// Evaluate every rule against `buffer`.
    pub fn evaluate(&self, buffer: &[u8]) -> Termination {
        if let Some(index) = self.separator_match(buffer) {
            return Termination::Separator(index);
        }
        if let Some(index) = self
            .stop_keywords
            .iter()
            .position(|keyword| buffer.ends_with(keyword))
        {
            return Termination::Keyword(index);
        }
        if self.limit_reached(buffer.len()) {
            return Termination::Limit;
        }
        Termination::Pending
    }

    /// Index of the first separator that `buffer` ends with.
    pub fn separator_match(&self, buffer: &[u8]) -> Option<usize> {
        self.separators
            .iter()
            .position(|separator| buffer.ends_with(separator))
    }

    pub fn limit_reached(&self, len: usize) -> bool {
        self.limit.is_some_and(|limit| len >= limit)
    }

    pub fn separators(&self) -> &[Bytes] {
        &self.separators
    }

    pub fn stop_keywords(&self) -> &[Bytes] {
        &self.stop_keywords
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
