//! Cross-field relationships
//!
//! Runs over typed fields, one record per message (or per package):
//! - a date field and a time field that always appear together
//! - a text field that splits into numeric sub-values (`12/34`)
//! - a numeric field equal to the sum, difference or ratio of two others
//!
//! A relation is only reported when it holds for a configured share of
//! the records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::field::{numeric_value, parse_token, FieldInfo, FieldType, TokenValue};
use super::package::{PackageInfo, SegmentInfo};
use super::tokenize;
use crate::config::RelationshipConfig;

/// Separators tried when splitting compound values
const COMPOUND_SEPARATORS: [char; 5] = ['/', ':', '-', '=', '_'];
/// Numeric fields considered for arithmetic relations
const MAX_DERIVED_FIELDS: usize = 16;

/// Field address: line position inside the package and token position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    /// Segment (line inside a package); 0 for single-segment corpora
    pub segment: usize,
    /// Token position
    pub position: usize,
}

/// Relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// Date and time fields form one timestamp
    DateTimeComposition,
    /// One field carries several sub-values
    CompoundField,
    /// Field computed from other fields
    Derived,
}

impl RelationKind {
    /// Kind tag
    pub fn name(&self) -> &'static str {
        match self {
            RelationKind::DateTimeComposition => "DateTimeComposition",
            RelationKind::CompoundField => "CompoundField",
            RelationKind::Derived => "Derived",
        }
    }
}

/// Detected relation between fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRelationship {
    /// Relation kind
    pub kind: RelationKind,
    /// Participating fields; for derived relations the result comes last
    pub fields: Vec<FieldRef>,
    /// Human-readable description
    pub description: String,
}

/// Records with one column per typed field
#[derive(Debug, Clone)]
pub struct FieldTable<'a> {
    columns: Vec<(FieldRef, &'a FieldInfo)>,
    rows: Vec<Vec<Option<&'a str>>>,
    decimal_comma: bool,
}

impl<'a> FieldTable<'a> {
    /// One record per message
    pub fn single<S: AsRef<str>>(bodies: &'a [S], delimiter: Option<char>, fields: &'a [FieldInfo]) -> Self {
        let columns = fields
            .iter()
            .map(|f| (FieldRef { segment: 0, position: f.position }, f))
            .collect();
        let rows = bodies
            .iter()
            .map(|body| {
                let tokens = tokenize(body.as_ref(), delimiter);
                fields
                    .iter()
                    .map(|f| tokens.get(f.position).copied().map(str::trim))
                    .collect()
            })
            .collect();
        Self { columns, rows, decimal_comma: delimiter != Some(',') }
    }

    /// One record per complete package, fields of all lines side by side
    pub fn packaged<S: AsRef<str>>(
        bodies: &'a [S],
        package: &PackageInfo,
        segments: &'a [SegmentInfo],
    ) -> Self {
        let columns = segments
            .iter()
            .flat_map(|s| {
                s.fields
                    .iter()
                    .map(move |f| (FieldRef { segment: s.index, position: f.position }, f))
            })
            .collect();

        let size = package.package_size.max(1);
        let starts = (package.offset..bodies.len()).step_by(size).filter(|s| s + size <= bodies.len());
        let rows = starts
            .map(|start| {
                segments
                    .iter()
                    .flat_map(|s| {
                        let tokens = tokenize(bodies[start + s.index].as_ref(), s.delimiter);
                        s.fields
                            .iter()
                            .map(|f| tokens.get(f.position).copied().map(str::trim))
                            .collect::<Vec<_>>()
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows, decimal_comma: true }
    }

    /// Build the table matching a corpus' package structure
    pub fn for_corpus<S: AsRef<str>>(
        bodies: &'a [S],
        delimiter: Option<char>,
        fields: &'a [FieldInfo],
        package: &PackageInfo,
        segments: &'a [SegmentInfo],
    ) -> Self {
        if package.is_package_based && !segments.is_empty() {
            Self::packaged(bodies, package, segments)
        } else {
            Self::single(bodies, delimiter, fields)
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No records
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn value(&self, row: usize, column: usize) -> Option<&'a str> {
        self.rows[row].get(column).copied().flatten().filter(|t| !t.is_empty())
    }

    fn number(&self, row: usize, column: usize) -> Option<f64> {
        self.value(row, column).and_then(|t| numeric_value(t, self.decimal_comma))
    }
}

/// Relationship detector
#[derive(Debug, Clone)]
pub struct RelationshipDetector {
    min_fraction: f64,
    min_samples: usize,
    ratio_tolerance: f64,
}

impl Default for RelationshipDetector {
    fn default() -> Self {
        Self::new(&RelationshipConfig::default())
    }
}

impl RelationshipDetector {
    /// Create from config
    pub fn new(config: &RelationshipConfig) -> Self {
        Self {
            min_fraction: config.min_fraction,
            min_samples: config.min_samples.max(1),
            ratio_tolerance: config.ratio_tolerance,
        }
    }

    /// Detect all relation kinds
    pub fn detect(&self, table: &FieldTable<'_>) -> Vec<FieldRelationship> {
        if table.len() < self.min_samples {
            return Vec::new();
        }
        let mut relations = self.date_time(table);
        relations.extend(self.compound(table));
        relations.extend(self.derived(table));
        tracing::debug!(relations = relations.len(), records = table.len(), "Relationships detected");
        relations
    }

    fn holds(&self, hits: usize, total: usize) -> bool {
        total >= self.min_samples && hits as f64 / total as f64 >= self.min_fraction
    }

    fn date_time(&self, table: &FieldTable<'_>) -> Vec<FieldRelationship> {
        let of_type = |t: FieldType| -> Vec<usize> {
            (0..table.columns.len())
                .filter(|&c| table.columns[c].1.field_type == t)
                .collect()
        };
        let mut times = of_type(FieldType::Time);
        let mut relations = Vec::new();

        for date in of_type(FieldType::Date) {
            let paired = times.iter().position(|&time| {
                let mut seen = 0;
                let mut both = 0;
                for row in 0..table.len() {
                    let d = table.value(row, date).map(|t| parse_token(t, false));
                    let t = table.value(row, time).map(|t| parse_token(t, false));
                    if d.is_none() && t.is_none() {
                        continue;
                    }
                    seen += 1;
                    if matches!(d, Some(TokenValue::Date(_))) && matches!(t, Some(TokenValue::Time(_))) {
                        both += 1;
                    }
                }
                self.holds(both, seen)
            });
            if let Some(idx) = paired {
                let time = times.remove(idx);
                let (date_ref, date_info) = table.columns[date];
                let (time_ref, time_info) = table.columns[time];
                relations.push(FieldRelationship {
                    kind: RelationKind::DateTimeComposition,
                    fields: vec![date_ref, time_ref],
                    description: format!(
                        "{} and {} combine into one timestamp",
                        date_info.name, time_info.name
                    ),
                });
            }
        }
        relations
    }

    fn compound(&self, table: &FieldTable<'_>) -> Vec<FieldRelationship> {
        let mut relations = Vec::new();
        for (column, (field_ref, info)) in table.columns.iter().enumerate() {
            if !matches!(info.field_type, FieldType::Enum | FieldType::String) || info.is_constant {
                continue;
            }
            let values: Vec<&str> = (0..table.len()).filter_map(|row| table.value(row, column)).collect();

            let split = COMPOUND_SEPARATORS.iter().find_map(|&sep| {
                let parts = values.first()?.split(sep).count();
                if parts < 2 {
                    return None;
                }
                let consistent = values
                    .iter()
                    .filter(|v| {
                        let pieces: Vec<&str> = v.split(sep).collect();
                        pieces.len() == parts
                            && pieces.iter().all(|p| !p.trim().is_empty())
                            && pieces.iter().any(|p| numeric_value(p, false).is_some())
                    })
                    .count();
                self.holds(consistent, values.len()).then_some((sep, parts))
            });

            if let Some((sep, parts)) = split {
                relations.push(FieldRelationship {
                    kind: RelationKind::CompoundField,
                    fields: vec![*field_ref],
                    description: format!("{} splits on '{}' into {} parts", info.name, sep, parts),
                });
            }
        }
        relations
    }

    fn derived(&self, table: &FieldTable<'_>) -> Vec<FieldRelationship> {
        let numeric: Vec<usize> = (0..table.columns.len())
            .filter(|&c| {
                let info = table.columns[c].1;
                info.field_type.is_numeric() && !info.is_constant && info.samples >= self.min_samples
            })
            .take(MAX_DERIVED_FIELDS)
            .collect();
        if numeric.len() < 3 {
            return Vec::new();
        }

        let mut relations = Vec::new();
        let mut used: HashSet<[usize; 3]> = HashSet::new();

        for op in [Op::Sum, Op::Difference, Op::Ratio] {
            for &target in &numeric {
                for &a in &numeric {
                    for &b in &numeric {
                        if a == target || b == target || a == b || (op == Op::Sum && a > b) {
                            continue;
                        }
                        let mut key = [a, b, target];
                        key.sort_unstable();
                        if used.contains(&key) || !self.derives(table, op, a, b, target) {
                            continue;
                        }
                        used.insert(key);
                        let name = |c: usize| table.columns[c].1.name.as_str();
                        relations.push(FieldRelationship {
                            kind: RelationKind::Derived,
                            fields: vec![table.columns[a].0, table.columns[b].0, table.columns[target].0],
                            description: format!("{} = {} {} {}", name(target), name(a), op.symbol(), name(b)),
                        });
                    }
                }
            }
        }
        relations
    }

    fn derives(&self, table: &FieldTable<'_>, op: Op, a: usize, b: usize, target: usize) -> bool {
        // Half a display step per rounded operand; integers are exact
        let step = |c: usize| {
            let info = table.columns[c].1;
            if info.field_type == FieldType::Integer {
                0.0
            } else {
                0.5 * 10f64.powi(-(info.decimals.unwrap_or(0) as i32))
            }
        };
        let abs_tolerance = step(a) + step(b) + step(target) + f64::EPSILON;

        let mut seen = 0;
        let mut hits = 0;
        for row in 0..table.len() {
            let (Some(x), Some(y), Some(z)) = (table.number(row, a), table.number(row, b), table.number(row, target))
            else {
                continue;
            };
            seen += 1;
            let ok = match op {
                Op::Sum => (x + y - z).abs() <= abs_tolerance,
                Op::Difference => (x - y - z).abs() <= abs_tolerance,
                Op::Ratio => {
                    y != 0.0 && (x / y - z).abs() <= (step(target) + f64::EPSILON).max(self.ratio_tolerance * z.abs())
                }
            };
            if ok {
                hits += 1;
            }
        }
        self.holds(hits, seen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Sum,
    Difference,
    Ratio,
}

impl Op {
    fn symbol(&self) -> char {
        match self {
            Op::Sum => '+',
            Op::Difference => '-',
            Op::Ratio => '/',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detect::field::FieldAnalyzer;

    fn relations(bodies: &[&str], delimiter: char) -> Vec<FieldRelationship> {
        let fields = FieldAnalyzer::default().analyze(bodies, Some(delimiter));
        let table = FieldTable::single(bodies, Some(delimiter), &fields);
        RelationshipDetector::default().detect(&table)
    }

    #[test]
    fn test_date_time_composition() {
        let found = relations(
            &["2024-03-01 17:19:38 12.5", "2024-03-01 17:19:39 12.6", "2024-03-01 17:19:40 12.9"],
            ' ',
        );
        let dt = found
            .iter()
            .find(|r| r.kind == RelationKind::DateTimeComposition)
            .unwrap();
        assert_eq!(dt.fields, vec![FieldRef { segment: 0, position: 0 }, FieldRef { segment: 0, position: 1 }]);
    }

    #[test]
    fn test_compound_field() {
        let found = relations(&["A,12/34", "B,13/35", "C,14/36", "D,15/37"], ',');
        let compound: Vec<_> = found.iter().filter(|r| r.kind == RelationKind::CompoundField).collect();
        assert_eq!(compound.len(), 1);
        assert_eq!(compound[0].fields[0].position, 1);
        assert!(compound[0].description.contains("'/'"));
    }

    #[test]
    fn test_derived_sum() {
        let found = relations(&["1,2,3", "2,5,7", "4,4,8", "10,1,11"], ',');
        let derived: Vec<_> = found.iter().filter(|r| r.kind == RelationKind::Derived).collect();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].fields.iter().map(|f| f.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(derived[0].description.contains('+'));
    }

    #[test]
    fn test_derived_ratio_with_rounding() {
        let found = relations(&["10,4,2.50", "9,7,1.29", "5,3,1.67", "8,3,2.67"], ',');
        assert!(found
            .iter()
            .any(|r| r.kind == RelationKind::Derived && r.description.contains('/')));
    }

    #[test]
    fn test_coincidence_not_reported() {
        let found = relations(&["1,2,3", "2,5,9", "4,4,1", "10,1,2"], ',');
        assert!(found.iter().all(|r| r.kind != RelationKind::Derived));
    }

    #[test]
    fn test_integer_off_by_one_not_derived() {
        let found = relations(&["1,2,4", "2,5,8", "4,4,9", "10,1,12", "3,7,11"], ',');
        assert!(found.iter().all(|r| r.kind != RelationKind::Derived), "{found:?}");
    }

    #[test]
    fn test_decimal_sum_within_rounding() {
        let found = relations(&["1.2,2.3,3.6", "2.1,5.4,7.5", "4.4,4.4,8.9", "0.6,1.7,2.2"], ',');
        assert!(found
            .iter()
            .any(|r| r.kind == RelationKind::Derived && r.description.contains('+')));
    }

    #[test]
    fn test_too_few_records() {
        assert!(relations(&["1,2,3", "2,5,7"], ',').is_empty());
    }
}
