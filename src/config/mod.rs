//! Configuration module
//!
//! Handles analyzer settings and their on-disk location

mod settings;

pub use settings::{
    AnalyzerConfig, DefinitionDefaults, DelimiterConfig, FieldConfig, PackageConfig,
    RelationshipConfig, StrategyConfig, TerminatorConfig,
};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "protoscope", "Protoscope")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default path of the analyzer configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("analyzer.toml"))
}

/// Create the configuration directory
pub fn init_directories() -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
