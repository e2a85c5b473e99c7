//! Captured message frames
//!
//! `LogData` is built once by the loader and never mutated afterwards; every
//! detector reads it through shared references.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::loader::SourceFormat;
use super::splitter;

/// Ordered, immutable list of captured message frames
#[derive(Debug, Clone)]
pub struct LogData {
    messages: Vec<Bytes>,
    total_bytes: usize,
    captured_at: DateTime<Utc>,
    source_format: SourceFormat,
}

impl LogData {
    /// Create from already-framed messages (capture order is kept)
    pub fn new(messages: Vec<Bytes>) -> Self {
        let total_bytes = messages.iter().map(Bytes::len).sum();
        Self {
            messages,
            total_bytes,
            captured_at: Utc::now(),
            source_format: SourceFormat::PlainText,
        }
    }

    /// Create from string frames, mostly useful for synthetic corpora
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(|l| Bytes::from(l.into())).collect())
    }

    /// Frame a flat buffer with the best of `candidates`, keeping terminators attached
    pub fn from_buffer(buffer: Bytes, candidates: &[&[u8]]) -> Self {
        let (_, frames) = splitter::frames(&buffer, candidates);
        Self::new(frames)
    }

    /// Set the capture timestamp
    #[must_use]
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Record the raw format the frames were loaded from
    #[must_use]
    pub fn with_source_format(mut self, format: SourceFormat) -> Self {
        self.source_format = format;
        self
    }

    /// Message frames in capture order
    pub fn messages(&self) -> &[Bytes] {
        &self.messages
    }

    /// Number of frames
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Total byte count across all frames
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Average frame length in bytes (0 for an empty capture)
    pub fn average_length(&self) -> f64 {
        if self.messages.is_empty() {
            0.0
        } else {
            self.total_bytes as f64 / self.messages.len() as f64
        }
    }

    /// Capture timestamp
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Raw format of the source
    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    /// True when there is nothing to analyze
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Concatenation of every frame, as originally captured
    pub fn raw_buffer(&self) -> Bytes {
        let mut output = Vec::with_capacity(self.total_bytes);
        for message in &self.messages {
            output.extend_from_slice(message);
        }
        Bytes::from(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::splitter::DEFAULT_CANDIDATES;

    #[test]
    fn test_counters() {
        let log = LogData::from_lines(["AB\r\n", "ABCD\r\n", ""]);
        assert_eq!(log.message_count(), 3);
        assert_eq!(log.messages().len(), log.message_count());
        assert_eq!(log.total_bytes(), 10);
        assert!((log.average_length() - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty() {
        let log = LogData::new(Vec::new());
        assert!(log.is_empty());
        assert_eq!(log.average_length(), 0.0);
    }

    #[test]
    fn test_from_buffer_keeps_order_and_terminators() {
        let log = LogData::from_buffer(Bytes::from_static(b"one\ntwo\nthree\n"), DEFAULT_CANDIDATES);
        let frames: Vec<&[u8]> = log.messages().iter().map(|m| &m[..]).collect();
        assert_eq!(frames, vec![&b"one\n"[..], &b"two\n"[..], &b"three\n"[..]]);
        assert_eq!(&log.raw_buffer()[..], b"one\ntwo\nthree\n");
    }
}
