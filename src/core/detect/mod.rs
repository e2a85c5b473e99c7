//! Structure detectors
//!
//! Each detector is a short-lived value built from its config section and
//! run once per analysis; none keeps state between runs.
//! - Terminator (message boundary)
//! - Delimiter (field separator)
//! - Field typing, units and ranges
//! - Multi-line packages
//! - Cross-field relationships
//! - Text encoding
//! - Overall strategy

pub mod delimiter;
pub mod encoding;
pub mod field;
pub mod package;
pub mod relationship;
pub mod strategy;
pub mod terminator;

pub use delimiter::{DelimiterDetector, DelimiterInfo};
pub use encoding::{EncodingDetector, EncodingInfo};
pub use field::{FieldAnalyzer, FieldInfo, FieldType};
pub use package::{PackageDetector, PackageInfo, SegmentInfo};
pub use relationship::{FieldRef, FieldRelationship, RelationKind, RelationshipDetector};
pub use strategy::{ParsingStrategy, ProtocolType, StrategyRecommendation, StrategyRecommender};
pub use terminator::{TerminatorDetector, TerminatorInfo, TerminatorKind};

/// Decode a frame as text with its terminator and line-ending bytes removed
pub fn message_body(frame: &[u8], terminator: &[u8]) -> String {
    let stripped = if !terminator.is_empty() && frame.ends_with(terminator) {
        &frame[..frame.len() - terminator.len()]
    } else {
        frame
    };
    String::from_utf8_lossy(stripped)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Split a message body into field tokens
///
/// Whitespace separators collapse runs (column-aligned output pads with
/// several spaces); other separators keep empty fields. Without a separator
/// the whole body is one token.
pub fn tokenize(body: &str, delimiter: Option<char>) -> Vec<&str> {
    match delimiter {
        Some(c) if c.is_whitespace() => body.split(c).filter(|t| !t.is_empty()).collect(),
        Some(c) => body.split(c).collect(),
        None => vec![body],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body() {
        assert_eq!(message_body(b"F 12.3\r\n", b"\r\n"), "F 12.3");
        assert_eq!(message_body(b"\x02A\x03", &[0x03]), "\u{2}A");
        assert_eq!(message_body(b"F 1\n", b""), "F 1");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("F  0.0", Some(' ')), vec!["F", "0.0"]);
        assert_eq!(tokenize("a,,b", Some(',')), vec!["a", "", "b"]);
        assert_eq!(tokenize("abc", None), vec!["abc"]);
    }
}
