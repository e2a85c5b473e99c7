//! CLI Exit Codes
//!
//! Stable exit codes so scripts can tell a missing capture from an
//! unreadable one or from a capture with no recognizable structure.

use std::process::ExitCode;

use crate::core::error::AnalysisError;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Capture matches no known format
    pub const FORMAT_ERROR: u8 = 18;

    /// Analysis ran but found no structure at all
    pub const INSUFFICIENT_DATA: u8 = 19;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;

    /// Every code, in table order
    pub const ALL: [u8; 9] = [0, 1, 2, 6, 7, 8, 18, 19, 127];
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message for the user
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Analysis produced nothing usable
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::INSUFFICIENT_DATA, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Exit code for a library error
pub fn code_for(err: &AnalysisError) -> u8 {
    match err {
        AnalysisError::NotFound(_) => ExitCodes::FILE_NOT_FOUND,
        AnalysisError::FormatError(_) | AnalysisError::Json(_) | AnalysisError::Yaml(_) => {
            ExitCodes::FORMAT_ERROR
        }
        AnalysisError::InvalidArgument(_) => ExitCodes::INVALID_ARGS,
        AnalysisError::Config(_) => ExitCodes::CONFIG_ERROR,
        AnalysisError::Render(_) => ExitCodes::INTERNAL_ERROR,
        AnalysisError::Io(io) => match io.kind() {
            std::io::ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            _ => ExitCodes::ERROR,
        },
    }
}

impl From<AnalysisError> for CliResult {
    fn from(err: AnalysisError) -> Self {
        Self::Error(code_for(&err), err.to_string())
    }
}

impl From<anyhow::Error> for CliResult {
    fn from(err: anyhow::Error) -> Self {
        let code = err
            .downcast_ref::<AnalysisError>()
            .map_or(ExitCodes::ERROR, code_for);
        Self::Error(code, format!("{err:#}"))
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        6 => "File not found",
        7 => "Permission denied",
        8 => "Configuration error",
        18 => "Unrecognized capture format",
        19 => "Insufficient data for analysis",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ExitCodes::ALL {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::error(ExitCodes::CONFIG_ERROR, "bad config");
        assert!(!error.is_success());
        assert_eq!(error.code(), 8);
        assert_eq!(error.message(), Some("bad config"));
    }

    #[test]
    fn test_from_analysis_error() {
        let missing = CliResult::from(AnalysisError::NotFound(PathBuf::from("capture.log")));
        assert_eq!(missing.code(), ExitCodes::FILE_NOT_FOUND);
        assert_eq!(CliResult::from(AnalysisError::format("x")).code(), ExitCodes::FORMAT_ERROR);
        assert_eq!(CliResult::from(AnalysisError::invalid("x")).code(), ExitCodes::INVALID_ARGS);
        assert_eq!(CliResult::from(AnalysisError::Render(std::fmt::Error)).code(), ExitCodes::INTERNAL_ERROR);
    }

    #[test]
    fn test_from_anyhow_keeps_analysis_code() {
        let err = anyhow::Error::from(AnalysisError::config("broken")).context("loading settings");
        assert_eq!(CliResult::from(err).code(), ExitCodes::CONFIG_ERROR);
        assert_eq!(CliResult::from(anyhow::anyhow!("boom")).code(), ExitCodes::ERROR);
    }

    #[test]
    fn test_descriptions_cover_table() {
        assert!(ExitCodes::ALL.iter().all(|&c| exit_code_description(c) != "Unknown error"));
    }
}
