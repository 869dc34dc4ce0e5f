//! Validated SQL identifiers.
//!
//! Database, schema, table and column names arrive as untrusted path and
//! query-string segments. They end up in two sensitive places: cache paths
//! on disk and SQL statements. An [`Identifier`] can only be constructed
//! from a plain `[A-Za-z_][A-Za-z0-9_]*` name no longer than PostgreSQL's
//! identifier limit, so neither place ever sees `..`, `/`, quotes or
//! whitespace.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// PostgreSQL truncates identifiers beyond 63 bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Error returned when a name is not a plain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Name is empty.
    #[error("identifier must not be empty")]
    Empty,

    /// Name exceeds [`MAX_IDENTIFIER_LEN`].
    #[error("identifier '{0}' is longer than {MAX_IDENTIFIER_LEN} bytes")]
    TooLong(String),

    /// Name contains characters outside `[A-Za-z0-9_]` or starts with a digit.
    #[error("'{0}' is not a valid identifier")]
    Invalid(String),
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// A database, schema, table or column name known to be safe to quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `name` and wrap it.
    ///
    /// # Examples
    ///
    /// ```
    /// use fastvector::tile::Identifier;
    ///
    /// assert!(Identifier::parse("parks").is_ok());
    /// assert!(Identifier::parse("../etc").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self, IdentifierError> {
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong(name.to_string()));
        }
        if !identifier_pattern().is_match(name) {
            return Err(IdentifierError::Invalid(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// The raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a double-quoted SQL identifier.
    ///
    /// Validation already excludes `"`, so no escaping is needed.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
