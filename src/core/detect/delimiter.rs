//! Delimiter detection
//!
//! A separator is structural when splitting by it yields the same field
//! count across the corpus and it does not show up inside numbers
//! (`12,5` as a decimal comma, `1.234` as a thousands mark).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tokenize;
use crate::config::DelimiterConfig;

/// Delimiter candidate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelimiterInfo {
    /// Separator character
    pub delimiter: char,
    /// Display label (`Comma`, `Space`, ...)
    pub label: String,
    /// Share of messages (0-1) with the modal split count
    pub frequency: f64,
    /// Structural confidence (0-1)
    pub confidence: f64,
    /// Confidence passed the structural threshold
    pub is_structural: bool,
    /// Occurrences across the corpus
    pub occurrences: usize,
    /// Modal number of fields when split by this delimiter
    pub field_count: usize,
}

/// Display label for a separator
pub fn delimiter_label(c: char) -> String {
    match c {
        ',' => "Comma".to_string(),
        ' ' => "Space".to_string(),
        '\t' => "Tab".to_string(),
        '|' => "Pipe".to_string(),
        ';' => "Semicolon".to_string(),
        ':' => "Colon".to_string(),
        '=' => "Equals".to_string(),
        other => format!("'{}'", other.escape_default()),
    }
}

/// Delimiter detector
#[derive(Debug, Clone)]
pub struct DelimiterDetector {
    candidates: Vec<char>,
    threshold: f64,
}

impl Default for DelimiterDetector {
    fn default() -> Self {
        Self::new(&DelimiterConfig::default())
    }
}

impl DelimiterDetector {
    /// Create from config
    pub fn new(config: &DelimiterConfig) -> Self {
        Self {
            candidates: config.candidates.clone(),
            threshold: config.structural_threshold,
        }
    }

    /// Score every candidate over terminator-free message bodies
    ///
    /// Results are ordered by confidence, descending; equal scores keep the
    /// configured candidate order.
    pub fn detect<S: AsRef<str>>(&self, bodies: &[S]) -> Vec<DelimiterInfo> {
        let mut results: Vec<DelimiterInfo> = self
            .candidates
            .iter()
            .map(|&c| self.score(c, bodies))
            .collect();

        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if let Some(best) = results.first() {
            tracing::debug!(
                delimiter = %best.label,
                confidence = best.confidence,
                structural = best.is_structural,
                "Delimiter candidates scored"
            );
        }
        results
    }

    /// Best structural delimiter, if any
    pub fn best<S: AsRef<str>>(&self, bodies: &[S]) -> Option<DelimiterInfo> {
        self.detect(bodies).into_iter().find(|d| d.is_structural)
    }

    fn score<S: AsRef<str>>(&self, c: char, bodies: &[S]) -> DelimiterInfo {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        let mut occurrences = 0usize;
        let mut interior = 0usize;

        for body in bodies {
            let body = body.as_ref();
            occurrences += body.matches(c).count();
            interior += numeric_interior_count(body, c);
            *counts.entry(tokenize(body, Some(c)).len()).or_insert(0) += 1;
        }

        // Most common split count; ties go to the larger count
        let (field_count, modal) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(&k, &v)| (k, v))
            .unwrap_or((0, 0));

        let frequency = if field_count > 1 && !bodies.is_empty() {
            modal as f64 / bodies.len() as f64
        } else {
            0.0
        };

        let interior_share = if occurrences > 0 {
            interior as f64 / occurrences as f64
        } else {
            0.0
        };
        let confidence = (frequency * (1.0 - 0.5 * interior_share)).clamp(0.0, 1.0);

        DelimiterInfo {
            delimiter: c,
            label: delimiter_label(c),
            frequency,
            confidence,
            is_structural: confidence > 0.0 && confidence >= self.threshold,
            occurrences,
            field_count,
        }
    }
}

/// Occurrences of `c` sitting inside a single number such as `12,5`
fn numeric_interior_count(body: &str, c: char) -> usize {
    if c.is_whitespace() {
        return 0;
    }
    body.split_whitespace()
        .filter(|token| {
            let mut parts = token.split(c);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(left), Some(right), None) => {
                    let left = left.trim_start_matches(['+', '-']);
                    !left.is_empty()
                        && !right.is_empty()
                        && left.chars().all(|ch| ch.is_ascii_digit())
                        && right.chars().all(|ch| ch.is_ascii_digit())
                }
                _ => false,
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_structural() {
        let bodies = ["F  0.0", "F 12.3", "F 45.6"];
        let results = DelimiterDetector::default().detect(&bodies);
        let best = &results[0];
        assert_eq!(best.delimiter, ' ');
        assert_eq!(best.label, "Space");
        assert!(best.is_structural);
        assert_eq!(best.frequency, 1.0);
        assert_eq!(best.field_count, 2);
        assert_eq!(best.occurrences, 4);
        let comma = results.iter().find(|d| d.delimiter == ',').unwrap();
        assert_eq!(comma.confidence, 0.0);
        assert!(!comma.is_structural);
    }

    #[test]
    fn test_csv() {
        let bodies = ["1,2.5,OK", "2,2.6,OK", "3,2.7,ERR"];
        let best = DelimiterDetector::default().best(&bodies).unwrap();
        assert_eq!(best.delimiter, ',');
        assert_eq!(best.field_count, 3);
        assert_eq!(best.confidence, 1.0);
    }

    #[test]
    fn test_decimal_comma_penalized() {
        let csv = ["A,1", "B,2", "C,3"];
        let decimal = ["12,5", "13,5", "14,5"];
        let detector = DelimiterDetector::default();
        let csv_conf = detector.detect(&csv)[0].confidence;
        let dec_conf = detector
            .detect(&decimal)
            .into_iter()
            .find(|d| d.delimiter == ',')
            .unwrap()
            .confidence;
        assert!(dec_conf < csv_conf);
    }

    #[test]
    fn test_fixed_width_has_no_delimiter() {
        let bodies = ["A0012B0034", "A0013B0035", "A0014B0036"];
        let results = DelimiterDetector::default().detect(&bodies);
        assert!(results.iter().all(|d| d.confidence == 0.0 && !d.is_structural));
    }

    #[test]
    fn test_confidence_monotonic_in_frequency() {
        let detector = DelimiterDetector::default();
        let low = ["a;b", "a;b;c", "a;b;c;d", "a"];
        let mid = ["a;b", "a;b", "a;b;c;d", "a"];
        let high = ["a;b", "a;b", "a;b", "a"];
        let conf = |bodies: &[&str]| {
            detector
                .detect(bodies)
                .into_iter()
                .find(|d| d.delimiter == ';')
                .unwrap()
                .confidence
        };
        assert!(conf(&low) <= conf(&mid));
        assert!(conf(&mid) <= conf(&high));
    }
}
