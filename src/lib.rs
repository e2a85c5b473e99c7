//! # Protoscope Core Library
//!
//! Infers the structure of captured serial traffic and turns it into a
//! reusable protocol definition.
//!
//! ## Pipeline
//!
//! - Log loading (hex dump with ASCII preview, pure hex, plain text)
//! - Binary-safe message framing
//! - Terminator and delimiter detection
//! - Field typing with units, ranges and enumerations
//! - Multi-line package detection
//! - Cross-field relationships
//! - Text encoding detection
//! - Strategy recommendation
//! - Definition export (JSON/YAML)
//!
//! ## Example
//!
//! ```rust,no_run
//! use protoscope_core::{loader, Analyzer, DefinitionGenerator};
//! use protoscope_core::core::splitter::DEFAULT_CANDIDATES;
//!
//! fn main() -> anyhow::Result<()> {
//!     let log = loader::load_file("scale.log")?.into_log_data(DEFAULT_CANDIDATES);
//!     let result = Analyzer::default().analyze(&log);
//!
//!     let definition = DefinitionGenerator::default().generate(&result, &log)?;
//!     definition.save("scale.json")?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::AnalyzerConfig;
pub use crate::core::analysis::{AnalysisResult, Analyzer};
pub use crate::core::definition::{DefinitionGenerator, ProtocolDefinition};
pub use crate::core::error::{AnalysisError, Result};
pub use crate::core::loader::{self, LoadedLog, SourceFormat};
pub use crate::core::log_data::LogData;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
