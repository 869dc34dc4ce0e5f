//! SQL statements with bound parameters.
//!
//! Statements are assembled from two kinds of material only: identifiers
//! that were validated against the database catalog, and `$n` placeholders
//! whose values travel separately as [`SqlValue`]s. User-supplied literals
//! never become part of the statement text.

mod builder;

pub use builder::{build_tile_query, QueryError, MVT_EXTENT, TABLE_ALIAS};

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl SqlValue {
    /// PostgreSQL type the placeholder is cast to.
    ///
    /// The explicit cast pins the parameter type so the driver never has to
    /// coerce, e.g., a 64-bit integer into an `int4` column's type.
    pub fn sql_type(&self) -> &'static str {
        match self {
            SqlValue::Int(_) => "bigint",
            SqlValue::Float(_) => "double precision",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "boolean",
        }
    }
}

/// Render the placeholder for parameter `index` (1-based) with its cast.
pub fn placeholder(index: usize, value: &SqlValue) -> String {
    format!("${}::{}", index, value.sql_type())
}

/// A boolean SQL expression plus the values for its placeholders.
///
/// Placeholders are numbered from `$1` in the order of `params`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// A complete statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// A statement without placeholders.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with bound parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_casts() {
        assert_eq!(placeholder(1, &SqlValue::Int(3)), "$1::bigint");
        assert_eq!(
            placeholder(2, &SqlValue::Float(1.5)),
            "$2::double precision"
        );
        assert_eq!(placeholder(3, &SqlValue::Text("a".into())), "$3::text");
        assert_eq!(placeholder(4, &SqlValue::Bool(true)), "$4::boolean");
    }
}
