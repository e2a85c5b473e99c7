//! Protocol definition document
//!
//! Pure assembly of an [`AnalysisResult`] into a versioned, serializable
//! definition. Property names are written verbatim (camelCase, `$schema`);
//! reading accepts any casing of them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::analysis::AnalysisResult;
use super::codec;
use super::detect::{FieldInfo, FieldRef, FieldType, ParsingStrategy, ProtocolType, RelationKind, SegmentInfo};
use super::error::{AnalysisError, Result};
use super::log_data::LogData;
use crate::config::DefinitionDefaults;

/// Every property name the document uses
const KNOWN_KEYS: &[&str] = &[
    "$schema", "version", "lastUpdated", "device", "name", "manufacturer", "model", "description",
    "communication", "baudRate", "dataBits", "parity", "stopBits", "handshake", "encoding",
    "protocol", "type", "format", "terminator", "packageSize", "startMarker", "endMarker",
    "fields", "segments", "relationships", "position", "unit", "unitAttached", "min", "max",
    "decimals", "values", "constant", "example", "index", "delimiter", "segment", "parsing",
    "strategy", "confidence",
];

static KEY_LOOKUP: LazyLock<HashMap<String, &'static str>> =
    LazyLock::new(|| KNOWN_KEYS.iter().map(|k| (k.to_ascii_lowercase(), *k)).collect());

/// Device metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Model
    pub model: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Serial line parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationInfo {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Parity
    pub parity: String,
    /// Stop bits
    pub stop_bits: String,
    /// Flow control
    pub handshake: String,
    /// Text encoding
    pub encoding: String,
}

/// One field of a message or package line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Token position
    pub position: usize,
    /// Field name
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Unit touches the value
    #[serde(default)]
    pub unit_attached: bool,
    /// Smallest observed value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Largest observed value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Digits after the decimal separator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    /// Closed set of observed values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Value never changes
    #[serde(default)]
    pub constant: bool,
    /// Sample value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl From<&FieldInfo> for FieldDefinition {
    fn from(field: &FieldInfo) -> Self {
        Self {
            position: field.position,
            name: field.name.clone(),
            field_type: field.field_type,
            unit: field.unit.clone(),
            unit_attached: field.unit_attached,
            min: field.min,
            max: field.max,
            decimals: field.decimals,
            values: field.unique_values.clone(),
            constant: field.is_constant,
            example: field.example.clone(),
        }
    }
}

/// One line position of a multi-line package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinition {
    /// Line position inside the package
    pub index: usize,
    /// Field separator (escaped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Sample line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Fields of this line
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl From<&SegmentInfo> for SegmentDefinition {
    fn from(segment: &SegmentInfo) -> Self {
        Self {
            index: segment.index,
            delimiter: segment.delimiter.map(escape_char),
            example: segment.example.clone(),
            fields: segment.fields.iter().map(FieldDefinition::from).collect(),
        }
    }
}

/// Relation between fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDefinition {
    /// Relation kind
    #[serde(rename = "type")]
    pub kind: RelationKind,
    /// Participating fields
    pub fields: Vec<FieldRef>,
    /// Description
    pub description: String,
}

/// Message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolInfo {
    /// Protocol classification
    #[serde(rename = "type")]
    pub protocol_type: ProtocolType,
    /// `Text` or `Binary`
    pub format: String,
    /// Escaped terminator (`\r\n`), empty when none was found
    pub terminator: String,
    /// Lines per package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_size: Option<usize>,
    /// Package start marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<String>,
    /// Package end marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    /// Fields of single-segment messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
    /// Line structures of multi-segment packages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentDefinition>,
    /// Cross-field relations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipDefinition>,
}

/// Parsing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingInfo {
    /// Parsing strategy
    pub strategy: ParsingStrategy,
    /// Field separator (escaped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Overall confidence (0-1)
    #[serde(default)]
    pub confidence: f64,
}

/// Exported protocol definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDefinition {
    /// Schema URI
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Document version
    pub version: String,
    /// Date of the capture (`YYYY-MM-DD`)
    pub last_updated: String,
    /// Device block
    pub device: DeviceInfo,
    /// Communication block
    pub communication: CommunicationInfo,
    /// Protocol block
    pub protocol: ProtocolInfo,
    /// Parsing block
    pub parsing: ParsingInfo,
}

impl ProtocolDefinition {
    /// Parse JSON, matching property names case-insensitively
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(serde_json::from_value(normalize_keys(value))?)
    }

    /// Parse YAML, matching property names case-insensitively
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Ok(serde_json::from_value(normalize_keys(value))?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write to a file; `.yaml`/`.yml` selects YAML, anything else JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) { self.to_yaml()? } else { self.to_json()? };
        std::fs::write(path, content)?;
        tracing::info!(path = %path.display(), "Protocol definition saved");
        Ok(())
    }

    /// Read from a file written by [`ProtocolDefinition::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnalysisError::NotFound(path.to_path_buf()),
            _ => AnalysisError::Io(e),
        })?;
        if is_yaml(path) {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Rewrite object keys to their canonical casing
fn normalize_keys(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let key = KEY_LOOKUP
                        .get(&key.to_ascii_lowercase())
                        .map_or(key, |canonical| (*canonical).to_string());
                    (key, normalize_keys(v))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

fn escape_char(c: char) -> String {
    codec::escape_str(c.encode_utf8(&mut [0; 4]))
}

/// Definition generator
#[derive(Debug, Clone)]
pub struct DefinitionGenerator {
    defaults: DefinitionDefaults,
}

impl Default for DefinitionGenerator {
    fn default() -> Self {
        Self::new(&DefinitionDefaults::default())
    }
}

impl DefinitionGenerator {
    /// Create with defaults for everything the capture cannot reveal
    pub fn new(defaults: &DefinitionDefaults) -> Self {
        Self { defaults: defaults.clone() }
    }

    /// Override the device name
    #[must_use]
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.defaults.device_name = name.into();
        self
    }

    /// Assemble the definition of an analyzed capture
    ///
    /// Fails with `InvalidArgument` when the result covers no messages or was
    /// produced from a different capture.
    pub fn generate(&self, result: &AnalysisResult, log: &LogData) -> Result<ProtocolDefinition> {
        if result.message_count == 0 {
            return Err(AnalysisError::invalid("analysis result covers no messages"));
        }
        if result.message_count != log.message_count() {
            return Err(AnalysisError::invalid(format!(
                "analysis result covers {} messages but the capture has {}",
                result.message_count,
                log.message_count()
            )));
        }

        let defaults = &self.defaults;
        let package = &result.package;
        let packaged = package.is_package_based;

        let definition = ProtocolDefinition {
            schema: defaults.schema.clone(),
            version: defaults.version.clone(),
            last_updated: log.captured_at().format("%Y-%m-%d").to_string(),
            device: DeviceInfo {
                name: defaults.device_name.clone(),
                manufacturer: defaults.manufacturer.clone(),
                model: defaults.model.clone(),
                description: format!(
                    "Inferred from {} messages ({} capture)",
                    result.message_count,
                    log.source_format().name()
                ),
            },
            communication: CommunicationInfo {
                baud_rate: defaults.baud_rate,
                data_bits: defaults.data_bits,
                parity: defaults.parity.clone(),
                stop_bits: defaults.stop_bits.clone(),
                handshake: defaults.handshake.clone(),
                encoding: result.encoding.clone(),
            },
            protocol: ProtocolInfo {
                protocol_type: result.protocol_type,
                format: if result.protocol_type == ProtocolType::BinaryControl {
                    "Binary".to_string()
                } else {
                    "Text".to_string()
                },
                terminator: result.terminator.display(),
                package_size: packaged.then_some(package.package_size),
                start_marker: package.start_marker.as_deref().filter(|_| packaged).map(codec::escape_str),
                end_marker: package.end_marker.as_deref().filter(|_| packaged).map(codec::escape_str),
                fields: if packaged {
                    Vec::new()
                } else {
                    result.fields.iter().map(FieldDefinition::from).collect()
                },
                segments: result.segments.iter().map(SegmentDefinition::from).collect(),
                relationships: result
                    .relationships
                    .iter()
                    .map(|r| RelationshipDefinition {
                        kind: r.kind,
                        fields: r.fields.clone(),
                        description: r.description.clone(),
                    })
                    .collect(),
            },
            parsing: ParsingInfo {
                strategy: result.strategy,
                delimiter: result.delimiter.map(escape_char),
                confidence: result.confidence,
            },
        };

        tracing::debug!(
            protocol = definition.protocol.protocol_type.name(),
            fields = definition.protocol.fields.len(),
            segments = definition.protocol.segments.len(),
            "Protocol definition generated"
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::core::analysis::Analyzer;

    fn scale_log() -> LogData {
        LogData::from_lines(["F  0.0\r\n", "F 12.3\r\n", "F 45.6\r\n"])
            .with_captured_at(Utc.with_ymd_and_hms(2024, 3, 1, 17, 19, 38).unwrap())
    }

    fn scale_definition() -> ProtocolDefinition {
        let log = scale_log();
        let result = Analyzer::default().analyze(&log);
        DefinitionGenerator::default().generate(&result, &log).unwrap()
    }

    #[test]
    fn test_generate_single_segment() {
        let definition = scale_definition();
        assert_eq!(definition.last_updated, "2024-03-01");
        assert_eq!(definition.protocol.terminator, "\\r\\n");
        assert_eq!(definition.protocol.protocol_type, ProtocolType::SingleSegment);
        assert_eq!(definition.protocol.package_size, None);
        assert_eq!(definition.protocol.fields.len(), 2);
        assert_eq!(definition.parsing.strategy, ParsingStrategy::DelimiterBased);
        assert_eq!(definition.parsing.delimiter.as_deref(), Some(" "));
        assert_eq!(definition.communication.baud_rate, 9600);
        assert_eq!(definition.communication.encoding, "ASCII");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(scale_definition(), scale_definition());
    }

    #[test]
    fn test_property_names_verbatim() {
        let json = scale_definition().to_json().unwrap();
        for key in ["\"$schema\"", "\"lastUpdated\"", "\"baudRate\"", "\"stopBits\"", "\"type\""] {
            assert!(json.contains(key), "missing {key}");
        }
        assert!(!json.contains("last_updated"));
    }

    #[test]
    fn test_case_insensitive_load() {
        let json = scale_definition()
            .to_json()
            .unwrap()
            .replace("\"lastUpdated\"", "\"LASTUPDATED\"")
            .replace("\"baudRate\"", "\"baudrate\"")
            .replace("\"$schema\"", "\"$Schema\"");
        let parsed = ProtocolDefinition::from_json(&json).unwrap();
        assert_eq!(parsed, scale_definition());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let definition = scale_definition();
        let yaml = definition.to_yaml().unwrap();
        assert_eq!(ProtocolDefinition::from_yaml(&yaml).unwrap(), definition);
    }

    #[test]
    fn test_rejects_mismatched_result() {
        let log = scale_log();
        let result = Analyzer::default().analyze(&log);
        let other = LogData::from_lines(["A\r\n"]);
        let err = DefinitionGenerator::default().generate(&result, &other).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));

        let empty = LogData::new(Vec::new());
        let empty_result = Analyzer::default().analyze(&empty);
        let err = DefinitionGenerator::default().generate(&empty_result, &empty).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[test]
    fn test_control_markers_escaped() {
        let lines: Vec<String> = (0..5)
            .flat_map(|i| {
                [
                    format!("STX {i:02}\r\n"),
                    format!("W {}.5 kg\r\n", 10 + i),
                    format!("T {}.1 C\r\n", 20 + i % 3),
                    format!("S {} ETX\r\n", i % 2),
                ]
            })
            .collect();
        let log = LogData::from_lines(lines);
        let mut result = Analyzer::default().analyze(&log);
        assert!(result.package.is_package_based);
        result.package.start_marker = Some("\u{2}W".to_string());
        result.package.end_marker = Some("\u{3}".to_string());

        let definition = DefinitionGenerator::default().generate(&result, &log).unwrap();
        assert_eq!(definition.protocol.start_marker.as_deref(), Some("\\x02W"));
        assert_eq!(definition.protocol.end_marker.as_deref(), Some("\\x03"));
    }

    #[test]
    fn test_device_name_override() {
        let log = scale_log();
        let result = Analyzer::default().analyze(&log);
        let definition = DefinitionGenerator::default()
            .with_device_name("Bench Scale")
            .generate(&result, &log)
            .unwrap();
        assert_eq!(definition.device.name, "Bench Scale");
    }
}
