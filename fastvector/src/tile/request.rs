//! Tile request types.
//!
//! Provides the `TileRequest` type that carries everything the orchestrator
//! needs to produce one vector tile, along with the `TableRef` and
//! `TileCacheKey` types derived from it.

use std::fmt;

use super::{Identifier, IdentifierError, TileCoord};

/// A table addressed by database, schema and table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub database: Identifier,
    pub schema: Identifier,
    pub table: Identifier,
}

impl TableRef {
    /// Validate the three names and build a table reference.
    pub fn new(database: &str, schema: &str, table: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            database: Identifier::parse(database)?,
            schema: Identifier::parse(schema)?,
            table: Identifier::parse(table)?,
        })
    }

    /// Name of the directory holding this table's cached tiles.
    ///
    /// Format: `{database}_{schema}_{table}`
    pub fn cache_dir_name(&self) -> String {
        format!("{}_{}_{}", self.database, self.schema, self.table)
    }

    /// Vector tile layer name, `{schema}.{table}`.
    pub fn layer_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// `"schema"."table"` for use in a FROM clause.
    pub fn qualified_sql(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.database, self.schema, self.table)
    }
}

/// Cache key: the 6-tuple (database, schema, table, z, x, y).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub table: TableRef,
    pub coord: TileCoord,
}

impl TileCacheKey {
    pub fn new(table: TableRef, coord: TileCoord) -> Self {
        Self { table, coord }
    }
}

impl fmt::Display for TileCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table.cache_dir_name(), self.coord)
    }
}

/// Request for one vector tile.
///
/// A request with a custom field projection or a filter expression depends
/// on caller-supplied parameters, so it is never read from or written to
/// the tile cache.
///
/// # Example
///
/// ```
/// use fastvector::tile::{TableRef, TileCoord, TileRequest};
///
/// let table = TableRef::new("data", "public", "parks").unwrap();
/// let request = TileRequest::new(table, TileCoord::new(10, 5, 5).unwrap());
/// assert!(request.is_cacheable());
///
/// let filtered = request.clone().with_filter("population > 1000");
/// assert!(!filtered.is_cacheable());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    table: TableRef,
    coord: TileCoord,
    fields: Option<Vec<Identifier>>,
    filter: Option<String>,
}

impl TileRequest {
    /// Create a request projecting every column with no filter.
    pub fn new(table: TableRef, coord: TileCoord) -> Self {
        Self {
            table,
            coord,
            fields: None,
            filter: None,
        }
    }

    /// Restrict the projection to `fields`.
    ///
    /// An empty list selects the geometry only.
    pub fn with_fields(mut self, fields: Vec<Identifier>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Attach a CQL filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn fields(&self) -> Option<&[Identifier]> {
        self.fields.as_deref()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// True when neither a projection nor a filter was supplied.
    ///
    /// The per-database retention still has to be positive for the
    /// orchestrator to actually use the cache.
    pub fn is_cacheable(&self) -> bool {
        self.fields.is_none() && self.filter.is_none()
    }

    /// The cache key for this request's tile.
    pub fn cache_key(&self) -> TileCacheKey {
        TileCacheKey::new(self.table.clone(), self.coord)
    }
}

/// Parse a comma-separated `fields` parameter.
///
/// Surrounding whitespace is trimmed and empty segments are skipped, so an
/// empty string yields an empty projection.
pub fn parse_fields(raw: &str) -> Result<Vec<Identifier>, IdentifierError> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(Identifier::parse)
        .collect()
}
