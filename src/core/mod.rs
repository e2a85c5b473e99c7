//! Core inference engine
//!
//! This module provides:
//! - Log loading from hex dumps, contiguous hex and plain text
//! - Message framing on terminator candidates
//! - Detectors for terminators, delimiters, fields, packages,
//!   field relationships, encodings and parsing strategy
//! - The analysis pipeline that runs them in order
//! - Protocol definition export (JSON/YAML)

pub mod analysis;
pub mod codec;
pub mod definition;
pub mod detect;
pub mod error;
pub mod loader;
pub mod log_data;
pub mod splitter;
