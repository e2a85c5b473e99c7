//! Error taxonomy for the inference core
//!
//! Detection stages never fail for "no pattern found"; those outcomes are
//! reported through zero confidence in the stage results. Only missing input,
//! unreadable content and misuse of the definition generator raise.

use std::path::PathBuf;
use thiserror::Error;

/// Crate result alias
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the inference pipeline
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input source does not exist
    #[error("log source not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Content matches none of the recognized raw formats
    #[error("unrecognized log format: {0}")]
    FormatError(String),

    /// A stage was handed input it cannot work with
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading a source or writing a definition
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Writing a text report failed
    #[error("render error: {0}")]
    Render(#[from] std::fmt::Error),
}

impl AnalysisError {
    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatError(msg.into())
    }

    /// Create an invalid-argument error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
