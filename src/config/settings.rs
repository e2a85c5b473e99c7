//! Analyzer settings
//!
//! Every threshold the detectors use lives here so a TOML file can tune
//! them. All sections default, so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{AnalysisError, Result};

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Terminator detection
    pub terminator: TerminatorConfig,
    /// Delimiter detection
    pub delimiter: DelimiterConfig,
    /// Field analysis
    pub fields: FieldConfig,
    /// Package detection
    pub package: PackageConfig,
    /// Relationship detection
    pub relationships: RelationshipConfig,
    /// Strategy selection
    pub strategy: StrategyConfig,
    /// Defaults written into generated definitions
    pub definition: DefinitionDefaults,
}

impl AnalyzerConfig {
    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnalysisError::NotFound(path.to_path_buf()),
            _ => AnalysisError::Io(e),
        })?;
        Self::from_toml(&content)
    }

    /// Load `analyzer.toml` from the config directory, or defaults when absent
    pub fn load_default() -> Result<Self> {
        match super::default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnalysisError::config(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AnalysisError::config(e.to_string()))
    }

    /// Save config to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Terminator detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminatorConfig {
    /// Standard candidates, in preference order
    pub candidates: Vec<String>,
    /// Share of messages (0-1) that must end with the terminator
    pub min_frequency: f64,
}

impl Default for TerminatorConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["\r\n".to_string(), "\n".to_string(), "\r".to_string()],
            min_frequency: 0.6,
        }
    }
}

impl TerminatorConfig {
    /// Candidates as byte sequences
    pub fn candidate_bytes(&self) -> Vec<Vec<u8>> {
        self.candidates
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.as_bytes().to_vec())
            .collect()
    }
}

/// Delimiter detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelimiterConfig {
    /// Candidate separator alphabet
    pub candidates: Vec<char>,
    /// Confidence (0-1) above which a delimiter is structural
    pub structural_threshold: f64,
}

impl Default for DelimiterConfig {
    fn default() -> Self {
        Self {
            candidates: vec![',', ' ', '\t', '|', ';'],
            structural_threshold: 0.6,
        }
    }
}

/// Field analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Distinct values kept per field; beyond this a field is continuous
    pub max_unique_values: usize,
    /// Use a non-numeric first message as field names
    pub detect_header: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            max_unique_values: 50,
            detect_header: true,
        }
    }
}

/// Package detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Confidence (0-1) needed to model the corpus as packages
    pub min_confidence: f64,
    /// Marker occurrences needed before a stride is considered
    pub min_occurrences: usize,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_occurrences: 2,
        }
    }
}

/// Relationship detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Share of sampled records (0-1) a relation must hold in
    pub min_fraction: f64,
    /// Records needed before any relation is reported
    pub min_samples: usize,
    /// Relative tolerance for ratio relations
    pub ratio_tolerance: f64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            min_fraction: 0.9,
            min_samples: 3,
            ratio_tolerance: 0.005,
        }
    }
}

/// Strategy selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Delimiter confidence (0-1) needed for delimiter-based parsing
    pub delimiter_threshold: f64,
    /// Share of messages with the modal length for position-based parsing
    pub position_stability: f64,
    /// Share of messages with a leading or trailing control byte for the binary path
    pub control_marker_fraction: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            delimiter_threshold: 0.6,
            position_stability: 0.8,
            control_marker_fraction: 0.6,
        }
    }
}

/// Values written into a definition when they cannot be inferred
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionDefaults {
    /// Schema URI
    pub schema: String,
    /// Definition version
    pub version: String,
    /// Device name
    pub device_name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Model
    pub model: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Parity
    pub parity: String,
    /// Stop bits
    pub stop_bits: String,
    /// Handshake / flow control
    pub handshake: String,
}

impl Default for DefinitionDefaults {
    fn default() -> Self {
        Self {
            schema: "https://protoscope.dev/schema/protocol-definition.json".to_string(),
            version: "1.0".to_string(),
            device_name: "Unknown Device".to_string(),
            manufacturer: "Unknown".to_string(),
            model: "Unknown".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: "None".to_string(),
            stop_bits: "One".to_string(),
            handshake: "None".to_string(),
        }
    }
}
