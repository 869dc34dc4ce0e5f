//! Table catalog lookups.
//!
//! Every identifier that reaches a tile statement is checked against the
//! database's own catalog first. [`fetch_column_set`] confirms the table
//! exists, confirms it has the configured geometry column, and returns the
//! remaining columns, which serve both as the default projection and as
//! the allowlist for filter expressions.

mod metadata;

pub use metadata::{fetch_table_metadata, list_tables, ColumnInfo, TableMetadata};

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{DatabaseError, SpatialDatabase};
use crate::query::{SqlStatement, SqlValue};
use crate::tile::{Identifier, TableRef};

/// Errors from catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The catalog has no such table.
    #[error("table {schema}.{table} not found")]
    TableNotFound { schema: String, table: String },

    /// The table exists but lacks the configured geometry column.
    #[error("table {schema}.{table} has no geometry column '{column}'")]
    MissingGeometryColumn {
        schema: String,
        table: String,
        column: String,
    },

    /// The catalog query itself failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Non-geometry columns of a table, in catalog order, plus its geometry column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    geometry_column: Identifier,
    columns: Vec<Identifier>,
}

impl ColumnSet {
    pub fn new(geometry_column: Identifier, columns: Vec<Identifier>) -> Self {
        Self {
            geometry_column,
            columns,
        }
    }

    pub fn geometry_column(&self) -> &Identifier {
        &self.geometry_column
    }

    pub fn columns(&self) -> &[Identifier] {
        &self.columns
    }

    /// Look up a non-geometry column by exact name.
    pub fn get(&self, name: &str) -> Option<&Identifier> {
        self.columns.iter().find(|c| c.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Catalog statement listing a table's columns in ordinal order.
pub fn column_set_statement(table: &TableRef) -> SqlStatement {
    SqlStatement::with_params(
        "SELECT column_name::text
FROM information_schema.columns
WHERE table_schema = $1::text
  AND table_name = $2::text
ORDER BY ordinal_position",
        vec![
            SqlValue::Text(table.schema.to_string()),
            SqlValue::Text(table.table.to_string()),
        ],
    )
}

/// Fetch the column allowlist for `table`.
///
/// Columns whose names are not plain identifiers (spaces, quotes, mixed
/// punctuation) are left out: they can be neither projected nor filtered.
pub async fn fetch_column_set(
    database: &dyn SpatialDatabase,
    table: &TableRef,
    geometry_column: &Identifier,
) -> Result<ColumnSet, CatalogError> {
    let rows = database
        .fetch_rows(&column_set_statement(table))
        .await?;

    if rows.is_empty() {
        return Err(CatalogError::TableNotFound {
            schema: table.schema.to_string(),
            table: table.table.to_string(),
        });
    }

    let mut has_geometry = false;
    let mut columns = Vec::with_capacity(rows.len());
    for name in rows.into_iter().filter_map(|row| row.into_iter().next().flatten()) {
        if name == geometry_column.as_str() {
            has_geometry = true;
            continue;
        }
        match Identifier::parse(&name) {
            Ok(column) => columns.push(column),
            Err(_) => warn!(table = %table, column = %name, "Skipping column with unsupported name"),
        }
    }

    if !has_geometry {
        return Err(CatalogError::MissingGeometryColumn {
            schema: table.schema.to_string(),
            table: table.table.to_string(),
            column: geometry_column.to_string(),
        });
    }

    debug!(table = %table, columns = columns.len(), "Fetched column set");
    Ok(ColumnSet::new(geometry_column.clone(), columns))
}
