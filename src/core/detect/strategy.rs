//! Protocol classification and parsing strategy
//!
//! Decision order:
//! 1. Control bytes framing most messages force a state machine
//! 2. Short requests alternating with long replies are command/response
//! 3. Multi-line packages are parsed frame by frame
//! 4. Otherwise a structural delimiter, then stable message length, then
//!    content matching as the fallback

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::delimiter::DelimiterInfo;
use super::field::FieldInfo;
use super::package::{is_framing_marker, leading_marker, PackageInfo};
use super::terminator::TerminatorInfo;
use crate::config::StrategyConfig;
use crate::core::codec;

/// Share of request/response pairs that must alternate in length
const ALTERNATION_SHARE: f64 = 0.8;
/// Confidence ceiling of the content-based fallback
const CONTENT_BASED_CEILING: f64 = 0.5;

/// Protocol classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolType {
    /// One message carries one complete reading
    #[default]
    SingleSegment,
    /// Readings span a fixed number of lines
    MultiSegment,
    /// Requests alternate with responses
    CommandResponse,
    /// Non-printable bytes frame the messages
    BinaryControl,
}

impl ProtocolType {
    /// All classifications
    pub fn all() -> &'static [ProtocolType] {
        &[
            ProtocolType::SingleSegment,
            ProtocolType::MultiSegment,
            ProtocolType::CommandResponse,
            ProtocolType::BinaryControl,
        ]
    }

    /// Type tag
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolType::SingleSegment => "SingleSegment",
            ProtocolType::MultiSegment => "MultiSegment",
            ProtocolType::CommandResponse => "CommandResponse",
            ProtocolType::BinaryControl => "BinaryControl",
        }
    }
}

/// Recommended parsing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParsingStrategy {
    /// Split on a separator character
    #[default]
    DelimiterBased,
    /// Collect a fixed number of lines per reading
    FixedFrame,
    /// Track framing bytes or request/response state
    StateMachine,
    /// Cut fields at fixed byte offsets
    PositionBased,
    /// Match values by pattern
    ContentBased,
}

impl ParsingStrategy {
    /// All strategies
    pub fn all() -> &'static [ParsingStrategy] {
        &[
            ParsingStrategy::DelimiterBased,
            ParsingStrategy::FixedFrame,
            ParsingStrategy::StateMachine,
            ParsingStrategy::PositionBased,
            ParsingStrategy::ContentBased,
        ]
    }

    /// Strategy tag
    pub fn name(&self) -> &'static str {
        match self {
            ParsingStrategy::DelimiterBased => "DelimiterBased",
            ParsingStrategy::FixedFrame => "FixedFrame",
            ParsingStrategy::StateMachine => "StateMachine",
            ParsingStrategy::PositionBased => "PositionBased",
            ParsingStrategy::ContentBased => "ContentBased",
        }
    }
}

/// Evidence collected by the earlier stages
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    /// Frames as captured, terminators attached
    pub frames: &'a [Bytes],
    /// Frames with terminators removed
    pub bodies: &'a [String],
    /// Terminator result
    pub terminator: &'a TerminatorInfo,
    /// Best structural delimiter
    pub delimiter: Option<&'a DelimiterInfo>,
    /// Package result
    pub package: &'a PackageInfo,
    /// Fields of the corpus
    pub fields: &'a [FieldInfo],
}

/// Strategy recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    /// Protocol classification
    pub protocol_type: ProtocolType,
    /// Parsing strategy
    pub strategy: ParsingStrategy,
    /// Overall confidence (0-1), never above the weakest contributing signal
    pub confidence: f64,
    /// Why this strategy was chosen
    pub reasons: Vec<String>,
}

/// Strategy recommender
#[derive(Debug, Clone)]
pub struct StrategyRecommender {
    config: StrategyConfig,
}

impl Default for StrategyRecommender {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl StrategyRecommender {
    /// Create from config
    pub fn new(config: &StrategyConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Classify the protocol and pick a parsing strategy
    pub fn recommend(&self, evidence: &Evidence<'_>) -> StrategyRecommendation {
        let mut reasons = Vec::new();
        let mut signals: Vec<f64> = Vec::new();

        let terminator = evidence.terminator;
        if terminator.detected {
            reasons.push(format!(
                "{} terminates {:.0}% of messages",
                terminator.display(),
                terminator.percentage
            ));
        } else {
            reasons.push("No consistent terminator".to_string());
        }
        signals.push(terminator.confidence / 100.0);

        let (protocol_type, strategy) = if let Some(share) = self.control_framing(evidence) {
            reasons.push(format!("Control bytes frame {:.0}% of messages", share * 100.0));
            signals.push(share);
            (ProtocolType::BinaryControl, ParsingStrategy::StateMachine)
        } else if let Some(share) = command_response_share(evidence.bodies) {
            reasons.push(format!(
                "Short requests alternate with longer responses in {:.0}% of pairs",
                share * 100.0
            ));
            signals.push(share);
            (ProtocolType::CommandResponse, ParsingStrategy::StateMachine)
        } else if evidence.package.is_package_based && evidence.package.package_size > 1 {
            reasons.push(format!(
                "Messages form {}-line packages",
                evidence.package.package_size
            ));
            signals.push(evidence.package.confidence);
            (ProtocolType::MultiSegment, ParsingStrategy::FixedFrame)
        } else {
            if evidence.package.inconsistent {
                reasons.push("Package markers recur at an irregular stride".to_string());
            }
            (ProtocolType::SingleSegment, self.single_segment(evidence, &mut reasons, &mut signals))
        };

        if let Some(mean) = mean_field_confidence(evidence.fields) {
            signals.push(mean);
        }

        let confidence = signals.into_iter().fold(1.0_f64, f64::min).clamp(0.0, 1.0);
        tracing::info!(
            protocol = protocol_type.name(),
            strategy = strategy.name(),
            confidence,
            "Strategy recommended"
        );

        StrategyRecommendation { protocol_type, strategy, confidence, reasons }
    }

    fn single_segment(
        &self,
        evidence: &Evidence<'_>,
        reasons: &mut Vec<String>,
        signals: &mut Vec<f64>,
    ) -> ParsingStrategy {
        if let Some(delimiter) = evidence
            .delimiter
            .filter(|d| d.confidence >= self.config.delimiter_threshold)
        {
            reasons.push(format!(
                "{} splits messages into {} fields (confidence {:.2})",
                delimiter.label, delimiter.field_count, delimiter.confidence
            ));
            signals.push(delimiter.confidence);
            return ParsingStrategy::DelimiterBased;
        }

        let stability = length_stability(evidence.bodies);
        if stability >= self.config.position_stability {
            reasons.push(format!(
                "No structural delimiter; {:.0}% of messages share one length",
                stability * 100.0
            ));
            signals.push(stability);
            return ParsingStrategy::PositionBased;
        }

        reasons.push("No delimiter or stable layout; match values by content".to_string());
        signals.push(CONTENT_BASED_CEILING);
        ParsingStrategy::ContentBased
    }

    /// Share of frames opened or closed by a control byte, when above threshold
    fn control_framing(&self, evidence: &Evidence<'_>) -> Option<f64> {
        if evidence.frames.is_empty() {
            return None;
        }
        let terminator = &evidence.terminator.bytes;
        let terminator_is_control = evidence.terminator.detected
            && terminator.iter().all(|&b| codec::is_control_byte(b));

        let framed = evidence
            .frames
            .iter()
            .filter(|frame| {
                let opens = frame.first().is_some_and(|&b| codec::is_control_byte(b));
                let body = frame.strip_suffix(terminator.as_slice()).unwrap_or(&frame[..]);
                let closes = body.last().is_some_and(|&b| codec::is_control_byte(b))
                    || (terminator_is_control && frame.ends_with(terminator));
                opens || closes
            })
            .count();
        let share = framed as f64 / evidence.frames.len() as f64;
        (share >= self.config.control_marker_fraction).then_some(share)
    }
}

/// Share of pairs where a short request precedes a longer response
///
/// Requests must come from a small set and must not look like package
/// headers (`STX`, `HDR`), which also alternate with longer lines.
fn command_response_share(bodies: &[String]) -> Option<f64> {
    if bodies.len() < 4 {
        return None;
    }
    [0, 1]
        .into_iter()
        .filter_map(|offset| {
            let pairs: Vec<(&str, &str)> = bodies[offset..]
                .chunks_exact(2)
                .map(|p| (p[0].trim(), p[1].trim()))
                .collect();
            if pairs.len() < 2 {
                return None;
            }
            let requests: Vec<&str> = pairs
                .iter()
                .filter(|(request, response)| !response.is_empty() && request.len() * 2 <= response.len())
                .map(|&(request, _)| request)
                .collect();
            let share = requests.len() as f64 / pairs.len() as f64;
            let distinct: HashSet<&str> = requests.iter().copied().collect();
            let header_like = requests
                .iter()
                .any(|r| leading_marker(r).is_some_and(is_framing_marker));
            (share >= ALTERNATION_SHARE && distinct.len() <= (pairs.len() / 4).max(2) && !header_like)
                .then_some(share)
        })
        .reduce(f64::max)
}

/// Share of messages with the most common length
fn length_stability(bodies: &[String]) -> f64 {
    if bodies.len() < 2 {
        return 0.0;
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for body in bodies {
        *counts.entry(body.len()).or_insert(0) += 1;
    }
    let modal = counts.values().copied().max().unwrap_or(0);
    modal as f64 / bodies.len() as f64
}

fn mean_field_confidence(fields: &[FieldInfo]) -> Option<f64> {
    let typed: Vec<f64> = fields
        .iter()
        .filter(|f| f.samples > 0)
        .map(|f| f.confidence)
        .collect();
    (!typed.is_empty()).then(|| typed.iter().sum::<f64>() / typed.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detect::{
        message_body, DelimiterDetector, FieldAnalyzer, PackageDetector, TerminatorDetector,
    };

    fn recommend(frames: &[&[u8]]) -> StrategyRecommendation {
        let frames: Vec<Bytes> = frames.iter().map(|f| Bytes::copy_from_slice(f)).collect();
        let terminator = TerminatorDetector::default().detect(&frames);
        let bodies: Vec<String> = frames.iter().map(|f| message_body(f, &terminator.bytes)).collect();
        let delimiter = DelimiterDetector::default().best(&bodies);
        let fields = FieldAnalyzer::default().analyze(&bodies, delimiter.as_ref().map(|d| d.delimiter));
        let package = PackageDetector::default().detect(&bodies);
        StrategyRecommender::default().recommend(&Evidence {
            frames: &frames,
            bodies: &bodies,
            terminator: &terminator,
            delimiter: delimiter.as_ref(),
            package: &package,
            fields: &fields,
        })
    }

    #[test]
    fn test_delimiter_based_single_segment() {
        let rec = recommend(&[b"F  0.0\r\n", b"F 12.3\r\n", b"F 45.6\r\n"]);
        assert_eq!(rec.protocol_type, ProtocolType::SingleSegment);
        assert_eq!(rec.strategy, ParsingStrategy::DelimiterBased);
        assert!(rec.confidence > 0.9);
        assert!(!rec.reasons.is_empty());
    }

    #[test]
    fn test_control_bytes_force_state_machine() {
        let rec = recommend(&[b"\x02W,12.5\x03", b"\x02W,12.6\x03", b"\x02W,12.7\x03"]);
        assert_eq!(rec.protocol_type, ProtocolType::BinaryControl);
        assert_eq!(rec.strategy, ParsingStrategy::StateMachine);
    }

    #[test]
    fn test_fixed_width_is_position_based() {
        let rec = recommend(&[b"A0012B0034\r\n", b"A0013B0035\r\n", b"A0014B0036\r\n"]);
        assert_eq!(rec.strategy, ParsingStrategy::PositionBased);
    }

    #[test]
    fn test_command_response() {
        let rec = recommend(&[
            b"?W\r\n",
            b"W 12.5 kg STABLE\r\n",
            b"?W\r\n",
            b"W 12.6 kg STABLE\r\n",
            b"?W\r\n",
            b"W 12.8 kg MOTION\r\n",
        ]);
        assert_eq!(rec.protocol_type, ProtocolType::CommandResponse);
        assert_eq!(rec.strategy, ParsingStrategy::StateMachine);
    }

    #[test]
    fn test_content_based_fallback() {
        let rec = recommend(&[b"hello\r\n", b"a much longer line of text\r\n", b"mid size\r\n"]);
        assert_eq!(rec.strategy, ParsingStrategy::ContentBased);
        assert!(rec.confidence <= CONTENT_BASED_CEILING);
    }

    #[test]
    fn test_confidence_bounded_by_weakest_signal() {
        let rec = recommend(&[b"F 1\r\n", b"F 2\r\n", b"F 3\r\n", b"F 4"]);
        assert!(rec.confidence <= 0.75);
    }
}
