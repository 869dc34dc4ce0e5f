//! CLI error type.

use std::io;
use std::path::PathBuf;

use fastvector::cache::CacheError;
use fastvector::config::ConfigError;
use fastvector::db::DatabaseError;
use fastvector::logging::LoggingError;
use fastvector::tile::IdentifierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no config file given and no default config directory on this platform")]
    NoConfigPath,

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("database setup failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("server error: {0}")]
    Serve(io::Error),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<IdentifierError> for CliError {
    fn from(e: IdentifierError) -> Self {
        CliError::Invalid(e.to_string())
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NoConfigPath
            | CliError::ConfigNotFound(_)
            | CliError::Config(_)
            | CliError::Invalid(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::ConfigNotFound(PathBuf::from("x.ini")).exit_code(), 2);
        assert_eq!(
            CliError::Serve(io::Error::new(io::ErrorKind::Other, "boom")).exit_code(),
            1
        );
    }

    #[test]
    fn test_config_not_found_message() {
        let err = CliError::ConfigNotFound(PathBuf::from("/etc/fastvector.ini"));
        assert_eq!(err.to_string(), "config file not found: /etc/fastvector.ini");
    }
}
