//! Terminator detection
//!
//! Proposes the standard line endings plus any 1-4 byte suffix shared by at
//! least two frames, then keeps the candidate that ends the most frames.

use std::cmp::Ordering;
use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::TerminatorConfig;
use crate::core::codec;

/// Longest custom suffix considered
const MAX_CUSTOM_LEN: usize = 4;

/// Terminator classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerminatorKind {
    /// Carriage return
    #[serde(rename = "CR")]
    Cr,
    /// Line feed
    #[serde(rename = "LF")]
    Lf,
    /// Carriage return + line feed
    #[serde(rename = "CRLF")]
    CrLf,
    /// Any other byte sequence
    Custom,
    /// No terminator detected
    #[default]
    None,
}

impl TerminatorKind {
    /// Classify a byte sequence
    pub fn classify(bytes: &[u8]) -> Self {
        match bytes {
            [] => TerminatorKind::None,
            b"\r\n" => TerminatorKind::CrLf,
            b"\n" => TerminatorKind::Lf,
            b"\r" => TerminatorKind::Cr,
            _ => TerminatorKind::Custom,
        }
    }

    /// Tag name
    pub fn name(&self) -> &'static str {
        match self {
            TerminatorKind::Cr => "CR",
            TerminatorKind::Lf => "LF",
            TerminatorKind::CrLf => "CRLF",
            TerminatorKind::Custom => "Custom",
            TerminatorKind::None => "None",
        }
    }
}

/// Detected message terminator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminatorInfo {
    /// Whether a terminator was found
    pub detected: bool,
    /// Terminator bytes (empty when not detected)
    pub bytes: Vec<u8>,
    /// Classification
    pub kind: TerminatorKind,
    /// Hex representation (e.g. `0D 0A`)
    pub hex: String,
    /// Messages ending with the terminator
    pub frequency: usize,
    /// Share of messages ending with the terminator (0-100)
    pub percentage: f64,
    /// Confidence (0-100)
    pub confidence: f64,
}

impl TerminatorInfo {
    /// Result for a corpus without a usable terminator
    pub fn none() -> Self {
        Self::default()
    }

    /// Escaped display form (`\r\n`, `\n`, `\x03`)
    pub fn display(&self) -> String {
        codec::escape(&self.bytes)
    }
}

/// Candidate class, in tie-break preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CandidateClass {
    /// One of the configured line endings; carries its config index
    Standard(usize),
    /// Suffix made of control bytes only
    Control,
    /// Suffix with printable punctuation
    Printable,
}

#[derive(Debug, Clone)]
struct Candidate {
    bytes: Vec<u8>,
    class: CandidateClass,
    count: usize,
}

impl Candidate {
    /// Ordering: most frequent first, then by class; among control suffixes
    /// the longest wins (`DLE ETX` over `ETX`), among printable ones the shortest
    fn rank(&self, other: &Self) -> Ordering {
        other
            .count
            .cmp(&self.count)
            .then(self.class.cmp(&other.class))
            .then_with(|| match self.class {
                CandidateClass::Control => other.bytes.len().cmp(&self.bytes.len()),
                _ => self.bytes.len().cmp(&other.bytes.len()),
            })
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

/// Terminator detector
#[derive(Debug, Clone)]
pub struct TerminatorDetector {
    standard: Vec<Vec<u8>>,
    min_frequency: f64,
}

impl Default for TerminatorDetector {
    fn default() -> Self {
        Self::new(&TerminatorConfig::default())
    }
}

impl TerminatorDetector {
    /// Create from config
    pub fn new(config: &TerminatorConfig) -> Self {
        Self {
            standard: config.candidate_bytes(),
            min_frequency: config.min_frequency,
        }
    }

    /// Detect the terminator of a message set
    pub fn detect(&self, messages: &[Bytes]) -> TerminatorInfo {
        if messages.is_empty() {
            return TerminatorInfo::none();
        }

        let mut candidates = self.candidates(messages);
        candidates.sort_by(Candidate::rank);

        let Some(best) = candidates.into_iter().next() else {
            return TerminatorInfo::none();
        };

        let total = messages.len() as f64;
        let percentage = best.count as f64 / total * 100.0;
        if best.count == 0 || percentage < self.min_frequency * 100.0 {
            tracing::debug!(percentage, "No terminator reaches the frequency threshold");
            return TerminatorInfo::none();
        }

        let confidence = (percentage * (1.0 - 0.5 * length_outliers(messages))).clamp(0.0, 100.0);
        let info = TerminatorInfo {
            detected: true,
            kind: TerminatorKind::classify(&best.bytes),
            hex: codec::hex_string(&best.bytes),
            bytes: best.bytes,
            frequency: best.count,
            percentage,
            confidence,
        };
        tracing::debug!(
            kind = info.kind.name(),
            hex = %info.hex,
            percentage = info.percentage,
            confidence = info.confidence,
            "Terminator detected"
        );
        info
    }

    fn candidates(&self, messages: &[Bytes]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .standard
            .iter()
            .enumerate()
            .map(|(idx, bytes)| Candidate {
                bytes: bytes.clone(),
                class: CandidateClass::Standard(idx),
                count: messages.iter().filter(|m| m.ends_with(bytes)).count(),
            })
            .collect();

        let mut suffixes: HashMap<&[u8], usize> = HashMap::new();
        for message in messages {
            for len in 1..=MAX_CUSTOM_LEN.min(message.len()) {
                *suffixes.entry(&message[message.len() - len..]).or_insert(0) += 1;
            }
        }

        for (suffix, count) in suffixes {
            if count < 2 || self.standard.iter().any(|s| s.as_slice() == suffix) {
                continue;
            }
            // Suffixes ending in a line ending are data followed by CR/LF
            if matches!(suffix.last(), Some(b'\r' | b'\n')) {
                continue;
            }
            let class = if suffix.iter().all(|&b| codec::is_control_byte(b)) {
                CandidateClass::Control
            } else if suffix.iter().any(|&b| b.is_ascii_punctuation() || codec::is_control_byte(b))
                && !suffix.iter().any(|b| b.is_ascii_alphanumeric() || *b == b' ')
            {
                CandidateClass::Printable
            } else {
                continue;
            };
            candidates.push(Candidate { bytes: suffix.to_vec(), class, count });
        }

        candidates
    }
}

/// Share of frames whose length is far (4x) from the median length
///
/// Merged frames (missed terminator) and fragments both show up here.
fn length_outliers(messages: &[Bytes]) -> f64 {
    let mut lengths: Vec<usize> = messages.iter().map(Bytes::len).collect();
    lengths.sort_unstable();
    let median = lengths[lengths.len() / 2] as f64;
    if median == 0.0 {
        return 0.0;
    }
    let outliers = lengths
        .iter()
        .filter(|&&l| (l as f64) < median / 4.0 || (l as f64) > median * 4.0)
        .count();
    outliers as f64 / lengths.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(lines: &[&[u8]]) -> Vec<Bytes> {
        lines.iter().map(|l| Bytes::copy_from_slice(l)).collect()
    }

    #[test]
    fn test_crlf_full_frequency() {
        let messages = frames(&[b"F  0.0\r\n", b"F 12.3\r\n", b"F 45.6\r\n"]);
        let info = TerminatorDetector::default().detect(&messages);
        assert!(info.detected);
        assert_eq!(info.bytes, b"\r\n");
        assert_eq!(info.kind, TerminatorKind::CrLf);
        assert_eq!(info.hex, "0D 0A");
        assert_eq!(info.frequency, 3);
        assert_eq!(info.percentage, 100.0);
        assert_eq!(info.confidence, 100.0);
        assert_eq!(info.display(), "\\r\\n");
    }

    #[test]
    fn test_lf_only() {
        let messages = frames(&[b"a\n", b"bb\n", b"c\n"]);
        let info = TerminatorDetector::default().detect(&messages);
        assert_eq!(info.kind, TerminatorKind::Lf);
    }

    #[test]
    fn test_custom_control_terminator() {
        let messages = frames(&[b"\x02W12\x10\x03", b"\x02W13\x10\x03", b"\x02W14\x10\x03"]);
        let info = TerminatorDetector::default().detect(&messages);
        assert!(info.detected);
        assert_eq!(info.kind, TerminatorKind::Custom);
        assert_eq!(info.bytes, vec![0x10, 0x03]);
        assert_eq!(info.percentage, 100.0);
    }

    #[test]
    fn test_custom_punctuation_terminator() {
        let messages = frames(&[b"A=1;#", b"A=2;#", b"A=3;#"]);
        let info = TerminatorDetector::default().detect(&messages);
        assert_eq!(info.bytes, b"#");
    }

    #[test]
    fn test_below_threshold_not_detected() {
        let messages = frames(&[b"a\r\n", b"b", b"c", b"d"]);
        let info = TerminatorDetector::default().detect(&messages);
        assert!(!info.detected);
        assert!(info.bytes.is_empty());
        assert_eq!(info.confidence, 0.0);
    }

    #[test]
    fn test_empty_corpus() {
        let info = TerminatorDetector::default().detect(&[]);
        assert!(!info.detected);
        assert_eq!(info.kind, TerminatorKind::None);
    }

    #[test]
    fn test_length_outliers_lower_confidence() {
        let mut lines: Vec<&[u8]> = vec![b"AAAA\r\n"; 9];
        lines.push(b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\r\n");
        let info = TerminatorDetector::default().detect(&frames(&lines));
        assert_eq!(info.percentage, 100.0);
        assert!(info.confidence < 100.0);
        assert!(info.confidence >= 90.0);
    }
}
