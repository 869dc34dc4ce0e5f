//! CLI subcommands.

pub mod cache;
pub mod config;
pub mod serve;

use std::path::{Path, PathBuf};

use fastvector::config::ConfigFile;

use crate::error::CliError;

/// Resolve the config path: explicit flag, else the platform default.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    explicit
        .or_else(ConfigFile::default_path)
        .ok_or(CliError::NoConfigPath)
}

/// Load and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path.to_path_buf()));
    }
    Ok(ConfigFile::load(path)?)
}
