//! CLI Module
//!
//! Support code for the `protoscope` binary:
//! - Exit codes for automation
//! - Text and JSON rendering of analysis results

pub mod exit_codes;
pub mod output;

pub use exit_codes::{code_for, exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use output::{render_analysis, render_definition, render_frames, OutputFormat};
