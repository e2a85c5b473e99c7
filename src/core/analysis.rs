//! Analysis pipeline
//!
//! Runs the detectors in their fixed order over one immutable capture and
//! collects everything into an [`AnalysisResult`].

use serde::{Deserialize, Serialize};

use super::detect::relationship::FieldTable;
use super::detect::strategy::Evidence;
use super::detect::{
    message_body, DelimiterDetector, DelimiterInfo, EncodingDetector, FieldAnalyzer, FieldInfo,
    FieldRelationship, PackageDetector, PackageInfo, ParsingStrategy, ProtocolType,
    RelationshipDetector, SegmentInfo, StrategyRecommender, TerminatorDetector, TerminatorInfo,
};
use super::log_data::LogData;
use crate::config::AnalyzerConfig;

/// Everything inferred from one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Message terminator
    pub terminator: TerminatorInfo,
    /// Delimiter candidates, best first
    pub delimiters: Vec<DelimiterInfo>,
    /// Delimiter used for field analysis
    pub delimiter: Option<char>,
    /// Fields of single-segment messages, by position
    pub fields: Vec<FieldInfo>,
    /// Cross-field relations
    pub relationships: Vec<FieldRelationship>,
    /// Package structure
    pub package: PackageInfo,
    /// Per-line structure of multi-line packages
    pub segments: Vec<SegmentInfo>,
    /// Messages analyzed
    pub message_count: usize,
    /// Average message length in bytes
    pub average_length: f64,
    /// Overall confidence (0-1)
    pub confidence: f64,
    /// Recommended parsing strategy
    pub strategy: ParsingStrategy,
    /// Protocol classification
    pub protocol_type: ProtocolType,
    /// Detected text encoding
    pub encoding: String,
    /// Encoding confidence (0-1)
    pub encoding_confidence: f64,
    /// Reasons behind the strategy
    pub reasons: Vec<String>,
}

impl AnalysisResult {
    /// Best structural delimiter, if any
    pub fn best_delimiter(&self) -> Option<&DelimiterInfo> {
        self.delimiter
            .and_then(|c| self.delimiters.iter().find(|d| d.delimiter == c))
    }
}

/// Pipeline driver
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    /// Create with a configuration
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run every stage over a capture
    pub fn analyze(&self, log: &LogData) -> AnalysisResult {
        let config = &self.config;
        let frames = log.messages();

        let terminator = TerminatorDetector::new(&config.terminator).detect(frames);
        let bodies: Vec<String> = frames
            .iter()
            .map(|frame| message_body(frame, &terminator.bytes))
            .collect();
        let populated: Vec<&str> = bodies
            .iter()
            .map(String::as_str)
            .filter(|b| !b.trim().is_empty())
            .collect();

        let delimiter_detector = DelimiterDetector::new(&config.delimiter);
        let delimiters = delimiter_detector.detect(&populated);
        let best = delimiters.iter().find(|d| d.is_structural).cloned();
        let delimiter = best.as_ref().map(|d| d.delimiter);

        let field_analyzer = FieldAnalyzer::new(&config.fields);
        let fields = field_analyzer.analyze(&populated, delimiter);

        let package = PackageDetector::new(&config.package).detect(&bodies);
        let segments = PackageDetector::segments(
            &bodies,
            &package,
            &delimiter_detector,
            &field_analyzer.clone().without_header(),
        );

        let table = FieldTable::for_corpus(&bodies, delimiter, &fields, &package, &segments);
        let relationships = RelationshipDetector::new(&config.relationships).detect(&table);

        let encoding = EncodingDetector::new().detect(&log.raw_buffer());

        let recommendation = StrategyRecommender::new(&config.strategy).recommend(&Evidence {
            frames,
            bodies: &bodies,
            terminator: &terminator,
            delimiter: best.as_ref(),
            package: &package,
            fields: if package.is_package_based { &[] as &[FieldInfo] } else { fields.as_slice() },
        });

        let result = AnalysisResult {
            terminator,
            delimiters,
            delimiter,
            fields,
            relationships,
            package,
            segments,
            message_count: log.message_count(),
            average_length: log.average_length(),
            confidence: recommendation.confidence,
            strategy: recommendation.strategy,
            protocol_type: recommendation.protocol_type,
            encoding: encoding.name,
            encoding_confidence: encoding.confidence,
            reasons: recommendation.reasons,
        };

        tracing::info!(
            messages = result.message_count,
            terminator = result.terminator.kind.name(),
            fields = result.fields.len(),
            package_size = result.package.package_size,
            strategy = result.strategy.name(),
            confidence = result.confidence,
            "Analysis complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_scale() {
        let log = LogData::from_lines(["F  0.0\r\n", "F 12.3\r\n", "F 45.6\r\n"]);
        let result = Analyzer::default().analyze(&log);
        assert_eq!(result.message_count, 3);
        assert_eq!(result.terminator.hex, "0D 0A");
        assert_eq!(result.delimiter, Some(' '));
        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.strategy, ParsingStrategy::DelimiterBased);
        assert_eq!(result.protocol_type, ProtocolType::SingleSegment);
        assert_eq!(result.encoding, "ASCII");
        assert!(result.segments.is_empty());
        assert_eq!(result.best_delimiter().map(|d| d.label.as_str()), Some("Space"));
    }

    #[test]
    fn test_empty_capture() {
        let result = Analyzer::default().analyze(&LogData::new(Vec::new()));
        assert_eq!(result.message_count, 0);
        assert!(!result.terminator.detected);
        assert!(result.fields.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
