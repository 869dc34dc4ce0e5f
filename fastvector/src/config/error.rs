//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file could not be read or is not valid INI.
    #[error("failed to read config {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    /// INI text could not be parsed.
    #[error("invalid config: {0}")]
    Parse(String),

    /// A value failed validation.
    #[error("invalid value '{value}' for {key} in [{section}]: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}
