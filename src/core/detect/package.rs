//! Multi-line package detection
//!
//! Some devices print one reading as a fixed number of lines, usually
//! opened by a start marker and closed by an end marker. A marker that
//! recurs at a constant stride gives the package size; each line position
//! inside the package is then analyzed on its own.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::delimiter::DelimiterDetector;
use super::field::{FieldAnalyzer, FieldInfo};
use crate::config::PackageConfig;

/// Share of packages whose last line must carry the same end marker
const END_MARKER_SHARE: f64 = 0.8;
/// Confidence bonus when both start and end markers are consistent
const BOTH_MARKERS_BONUS: f64 = 0.1;

/// Package structure of a corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Messages group into fixed-size packages
    pub is_package_based: bool,
    /// Lines per package (1 for single-segment corpora)
    pub package_size: usize,
    /// Literal opening the first line of each package
    pub start_marker: Option<String>,
    /// Literal closing the last line of each package
    pub end_marker: Option<String>,
    /// Complete packages found
    pub package_count: usize,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Markers recur but the stride varies
    pub inconsistent: bool,
    /// Index of the first message of the first package
    pub offset: usize,
}

impl Default for PackageInfo {
    fn default() -> Self {
        Self::single()
    }
}

impl PackageInfo {
    /// Independent single-segment messages
    pub fn single() -> Self {
        Self {
            is_package_based: false,
            package_size: 1,
            start_marker: None,
            end_marker: None,
            package_count: 0,
            confidence: 0.0,
            inconsistent: false,
            offset: 0,
        }
    }
}

/// Structure of one line position inside a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Line position inside the package (0-based)
    pub index: usize,
    /// Separator used by this line, if any
    pub delimiter: Option<char>,
    /// Fields of this line
    pub fields: Vec<FieldInfo>,
    /// Lines observed at this position
    pub line_count: usize,
    /// First observed line
    pub example: Option<String>,
}

fn is_marker_char(c: char) -> bool {
    c.is_alphabetic()
        || (c.is_control() && !matches!(c, '\r' | '\n' | '\t'))
        || "#$@*!<>[]{}~^&?".contains(c)
}

/// Control characters, bare punctuation, or a well-known framing word
pub(crate) fn is_framing_marker(marker: &str) -> bool {
    const WORDS: &[&str] = &[
        "STX", "ETX", "SOH", "EOT", "ETB", "START", "END", "BEGIN", "HDR", "HEADER", "FOOTER",
    ];
    marker.chars().any(char::is_control)
        || marker.chars().all(|c| c.is_ascii_punctuation())
        || WORDS.contains(&marker.to_ascii_uppercase().as_str())
}

/// Leading run of marker characters (`STX` in `STX 01 02`)
pub fn leading_marker(body: &str) -> Option<&str> {
    let end = body
        .char_indices()
        .find(|&(_, c)| !is_marker_char(c))
        .map_or(body.len(), |(i, _)| i);
    (end > 0).then(|| &body[..end])
}

/// Trailing run of marker characters (`ETX` in `CS 12 ETX`)
pub fn trailing_marker(body: &str) -> Option<&str> {
    let start = body
        .char_indices()
        .rev()
        .find(|&(_, c)| !is_marker_char(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    (start < body.len()).then(|| &body[start..])
}

/// Stride statistics of a marker's positions
#[derive(Debug, Clone, Copy)]
struct Stride {
    size: usize,
    regularity: f64,
    coverage: f64,
}

impl Stride {
    fn of(positions: &[usize], total: usize) -> Option<Self> {
        if positions.len() < 2 {
            return None;
        }
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for pair in positions.windows(2) {
            *counts.entry(pair[1] - pair[0]).or_insert(0) += 1;
        }
        // Most common stride, smaller on ties
        let (&size, &count) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))?;
        let span = total - positions[0];
        Some(Self {
            size,
            regularity: count as f64 / (positions.len() - 1) as f64,
            coverage: ((positions.len() * size) as f64 / span as f64).min(1.0),
        })
    }

    fn score(&self) -> f64 {
        self.regularity * self.coverage
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    start_marker: Option<String>,
    end_marker: Option<String>,
    stride: Stride,
    offset: usize,
    package_count: usize,
    first: usize,
}

impl Candidate {
    fn confidence(&self) -> f64 {
        let bonus = if self.start_marker.is_some() && self.end_marker.is_some() {
            BOTH_MARKERS_BONUS
        } else {
            0.0
        };
        (self.stride.score() + bonus).min(1.0)
    }

    /// Markers that look like framing tokens rather than data
    fn framing_markers(&self) -> usize {
        [&self.start_marker, &self.end_marker]
            .into_iter()
            .flatten()
            .filter(|m| is_framing_marker(m))
            .count()
    }
}

/// Package detector
#[derive(Debug, Clone)]
pub struct PackageDetector {
    min_confidence: f64,
    min_occurrences: usize,
}

impl Default for PackageDetector {
    fn default() -> Self {
        Self::new(&PackageConfig::default())
    }
}

impl PackageDetector {
    /// Create from config
    pub fn new(config: &PackageConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_occurrences: config.min_occurrences.max(2),
        }
    }

    /// Detect package structure over terminator-free message bodies
    pub fn detect<S: AsRef<str>>(&self, bodies: &[S]) -> PackageInfo {
        let bodies: Vec<&str> = bodies.iter().map(AsRef::as_ref).collect();
        if bodies.len() < 2 * self.min_occurrences.max(2) {
            return PackageInfo::single();
        }

        let mut candidates = self.start_candidates(&bodies);
        if candidates.is_empty() {
            candidates = self.end_candidates(&bodies);
        }

        let best = candidates.into_iter().max_by(|a, b| {
            a.confidence()
                .total_cmp(&b.confidence())
                .then(a.framing_markers().cmp(&b.framing_markers()))
                .then(a.end_marker.is_some().cmp(&b.end_marker.is_some()))
                .then(b.first.cmp(&a.first))
        });
        let Some(best) = best else {
            return PackageInfo::single();
        };

        let confidence = best.confidence();
        let is_package_based = confidence >= self.min_confidence;
        let inconsistent = !is_package_based && best.stride.regularity < 1.0;
        let info = PackageInfo {
            is_package_based,
            package_size: if is_package_based || inconsistent { best.stride.size } else { 1 },
            start_marker: best.start_marker,
            end_marker: best.end_marker,
            package_count: if is_package_based { best.package_count } else { 0 },
            confidence,
            inconsistent,
            offset: if is_package_based { best.offset } else { 0 },
        };

        if info.inconsistent {
            tracing::warn!(
                modal_size = info.package_size,
                confidence = info.confidence,
                "Package markers recur at an irregular stride"
            );
        } else {
            tracing::debug!(
                package_based = info.is_package_based,
                size = info.package_size,
                count = info.package_count,
                confidence = info.confidence,
                "Package structure detected"
            );
        }
        info
    }

    fn marker_positions<'a>(
        bodies: &[&'a str],
        marker_of: impl Fn(&'a str) -> Option<&'a str>,
    ) -> HashMap<&'a str, Vec<usize>> {
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, body) in bodies.iter().enumerate() {
            if let Some(marker) = marker_of(body) {
                positions.entry(marker).or_default().push(idx);
            }
        }
        positions
    }

    fn start_candidates(&self, bodies: &[&str]) -> Vec<Candidate> {
        let total = bodies.len();
        Self::marker_positions(bodies, leading_marker)
            .into_iter()
            .filter(|(_, positions)| positions.len() >= self.min_occurrences)
            .filter_map(|(marker, positions)| {
                let stride = Stride::of(&positions, total)?;
                if stride.size < 2 {
                    return None;
                }
                let ends: Vec<&str> = positions
                    .iter()
                    .filter_map(|&i| bodies.get(i + stride.size - 1))
                    .copied()
                    .collect();
                Some(Candidate {
                    start_marker: Some(marker.to_string()),
                    end_marker: consistent_marker(&ends, trailing_marker),
                    stride,
                    offset: positions[0],
                    package_count: positions.iter().filter(|&&i| i + stride.size <= total).count(),
                    first: positions[0],
                })
            })
            .collect()
    }

    fn end_candidates(&self, bodies: &[&str]) -> Vec<Candidate> {
        let total = bodies.len();
        Self::marker_positions(bodies, trailing_marker)
            .into_iter()
            .filter(|(_, positions)| positions.len() >= self.min_occurrences)
            .filter_map(|(marker, positions)| {
                let stride = Stride::of(&positions, total)?;
                if stride.size < 2 {
                    return None;
                }
                Some(Candidate {
                    start_marker: None,
                    end_marker: Some(marker.to_string()),
                    stride,
                    offset: (positions[0] + 1) % stride.size,
                    package_count: positions.iter().filter(|&&i| i + 1 >= stride.size).count(),
                    first: positions[0],
                })
            })
            .collect()
    }

    /// Group bodies by line position inside the package
    ///
    /// Lines before the first package start are a partial package and are dropped.
    pub fn line_groups<'a, S: AsRef<str>>(bodies: &'a [S], package: &PackageInfo) -> Vec<Vec<&'a str>> {
        let size = package.package_size.max(1);
        let mut groups: Vec<Vec<&str>> = vec![Vec::new(); size];
        for (idx, body) in bodies.iter().enumerate().skip(package.offset) {
            groups[(idx - package.offset) % size].push(body.as_ref());
        }
        groups
    }

    /// Analyze every line group with its own delimiter and field analysis
    pub fn segments<S: AsRef<str>>(
        bodies: &[S],
        package: &PackageInfo,
        delimiters: &DelimiterDetector,
        fields: &FieldAnalyzer,
    ) -> Vec<SegmentInfo> {
        if !package.is_package_based {
            return Vec::new();
        }
        Self::line_groups(bodies, package)
            .into_iter()
            .enumerate()
            .map(|(index, lines)| {
                let delimiter = delimiters.best(&lines).map(|d| d.delimiter);
                SegmentInfo {
                    index,
                    delimiter,
                    fields: fields.analyze(&lines, delimiter),
                    line_count: lines.len(),
                    example: lines.first().map(|l| l.to_string()),
                }
            })
            .collect()
    }
}

/// Marker shared by at least [`END_MARKER_SHARE`] of the lines
fn consistent_marker<'a>(lines: &[&'a str], marker_of: fn(&'a str) -> Option<&'a str>) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for line in lines {
        if let Some(marker) = marker_of(line) {
            *counts.entry(marker).or_insert(0) += 1;
        }
    }
    let (marker, count) = counts.into_iter().max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))?;
    (count as f64 / lines.len() as f64 >= END_MARKER_SHARE).then(|| marker.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(n: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for i in 0..n {
            lines.push(format!("STX {:02}", i));
            lines.push(format!("W {}.5 kg", 10 + i));
            lines.push(format!("T {}.1 C", 20 + i % 3));
            lines.push(format!("S {} ETX", i % 2));
        }
        lines
    }

    #[test]
    fn test_markers() {
        assert_eq!(leading_marker("STX 01"), Some("STX"));
        assert_eq!(trailing_marker("S 1 ETX"), Some("ETX"));
        assert_eq!(leading_marker("12.5"), None);
        assert_eq!(trailing_marker("12.5"), None);
        assert_eq!(leading_marker("\u{2}W12"), Some("\u{2}W"));
    }

    #[test]
    fn test_four_line_package() {
        let info = PackageDetector::default().detect(&cycle(5));
        assert!(info.is_package_based);
        assert_eq!(info.package_size, 4);
        assert_eq!(info.start_marker.as_deref(), Some("STX"));
        assert_eq!(info.end_marker.as_deref(), Some("ETX"));
        assert_eq!(info.package_count, 5);
        assert!(info.confidence >= 0.6);
        assert!(!info.inconsistent);
    }

    #[test]
    fn test_capture_starting_mid_package() {
        let lines = cycle(5);
        let info = PackageDetector::default().detect(&lines[2..]);
        assert!(info.is_package_based);
        assert_eq!(info.package_size, 4);
        assert_eq!(info.offset, 2);
    }

    #[test]
    fn test_single_segment_corpus() {
        let bodies = ["F  0.0", "F 12.3", "F 45.6", "F 45.7", "F 45.8"];
        let info = PackageDetector::default().detect(&bodies);
        assert!(!info.is_package_based);
        assert_eq!(info.package_size, 1);
    }

    #[test]
    fn test_irregular_stride_is_inconsistent() {
        let bodies = [
            "HDR", "1", "2", "HDR", "1", "HDR", "1", "2", "3", "4", "HDR", "1", "2", "3", "HDR", "1",
        ];
        let info = PackageDetector::default().detect(&bodies);
        assert!(!info.is_package_based);
        assert!(info.inconsistent);
        assert!(info.confidence < 0.6);
    }

    #[test]
    fn test_line_groups_and_segments() {
        let lines = cycle(3);
        let info = PackageDetector::default().detect(&lines);
        let groups = PackageDetector::line_groups(&lines, &info);
        assert_eq!(groups.len(), 4);
        assert!(groups[0].iter().all(|l| l.starts_with("STX")));

        let segments = PackageDetector::segments(
            &lines,
            &info,
            &DelimiterDetector::default(),
            &FieldAnalyzer::default(),
        );
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1].delimiter, Some(' '));
        assert_eq!(segments[1].fields[2].unit, None);
        assert_eq!(segments[1].fields[1].unit.as_deref(), Some("kg"));
    }
}
