//! Errors surfaced by the tile service.

use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::db::DatabaseError;
use crate::filter::FilterError;
use crate::query::QueryError;
use crate::tile::{CoordError, IdentifierError};

/// Everything that can go wrong serving a tile or table request.
///
/// Client errors (4xx) describe a bad request; server errors (5xx) describe
/// a failing backend. [`TileError::status_code`] gives the HTTP mapping.
#[derive(Debug, Error)]
pub enum TileError {
    /// A database, schema, table or field name is not a plain identifier.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    /// Zoom out of range or x/y outside the grid.
    #[error(transparent)]
    InvalidTile(#[from] CoordError),

    /// No database with this name is configured.
    #[error("unknown database '{0}'")]
    UnknownDatabase(String),

    /// The database has no such table.
    #[error("table {schema}.{table} not found")]
    UnknownTable { schema: String, table: String },

    /// The table exists but has no geometry column to render.
    #[error("table {schema}.{table} has no geometry column '{column}'")]
    MissingGeometry {
        schema: String,
        table: String,
        column: String,
    },

    /// The filter expression does not parse.
    #[error("invalid filter at byte {position}: {message}")]
    InvalidFilterSyntax { position: usize, message: String },

    /// A projected or filtered field is not a column of the table.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The database failed to produce a result.
    #[error("backend query failed: {0}")]
    BackendQueryFailed(#[from] DatabaseError),

    /// A cached tile exists but could not be read.
    #[error("tile cache unavailable: {0}")]
    CacheIoFailed(#[from] CacheError),
}

impl TileError {
    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TileError::InvalidIdentifier(_)
            | TileError::InvalidTile(_)
            | TileError::MissingGeometry { .. }
            | TileError::InvalidFilterSyntax { .. }
            | TileError::UnknownField(_) => 400,
            TileError::UnknownDatabase(_) | TileError::UnknownTable { .. } => 404,
            TileError::BackendQueryFailed(_) | TileError::CacheIoFailed(_) => 500,
        }
    }
}

impl From<FilterError> for TileError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidSyntax { position, message } => {
                TileError::InvalidFilterSyntax { position, message }
            }
            FilterError::UnknownField(name) => TileError::UnknownField(name),
        }
    }
}

impl From<QueryError> for TileError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnknownField(name) => TileError::UnknownField(name),
        }
    }
}

impl From<CatalogError> for TileError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::TableNotFound { schema, table } => {
                TileError::UnknownTable { schema, table }
            }
            CatalogError::MissingGeometryColumn {
                schema,
                table,
                column,
            } => TileError::MissingGeometry {
                schema,
                table,
                column,
            },
            CatalogError::Database(e) => TileError::BackendQueryFailed(e),
        }
    }
}
