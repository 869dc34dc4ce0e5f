//! Table listing and per-table metadata.
//!
//! Read-through catalog queries backing the table endpoints. Nothing here
//! is cached; each call hits the database.

use serde::Serialize;

use crate::db::{DatabaseError, DbRow, SpatialDatabase};
use crate::query::{SqlStatement, SqlValue};
use crate::tile::{Identifier, TableRef};

use super::{fetch_column_set, CatalogError};

/// A column as described by `pg_attribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: Option<String>,
}

/// Descriptive metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub table: TableRef,
    pub columns: Vec<ColumnInfo>,
    /// `ST_GeometryType` of the first row, e.g. `ST_MultiPolygon`.
    pub geometry_type: Option<String>,
    /// `[min_x, min_y, max_x, max_y]` in EPSG:4326; `None` for an empty table.
    pub bounds: Option<[f64; 4]>,
    /// Centroid `[x, y]` in EPSG:4326; `None` for an empty table.
    pub center: Option<[f64; 2]>,
}

const LIST_TABLES_SQL: &str = "SELECT schemaname::text, tablename::text
FROM pg_catalog.pg_tables
WHERE schemaname NOT IN ('pg_catalog', 'information_schema', 'topology')
  AND tablename <> 'spatial_ref_sys'
ORDER BY schemaname, tablename";

/// List the user tables of `database`.
///
/// Tables whose schema or name is not a plain identifier cannot be served
/// and are omitted.
pub async fn list_tables(
    db: &dyn SpatialDatabase,
    database: &Identifier,
) -> Result<Vec<TableRef>, CatalogError> {
    let rows = db.fetch_rows(&SqlStatement::new(LIST_TABLES_SQL)).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let schema = text_at(&row, 0)?;
            let table = text_at(&row, 1)?;
            TableRef::new(database.as_str(), schema, table).ok()
        })
        .collect())
}

/// Describe `table`: columns, geometry type, bounds and center.
pub async fn fetch_table_metadata(
    db: &dyn SpatialDatabase,
    table: &TableRef,
    geometry_column: &Identifier,
) -> Result<TableMetadata, CatalogError> {
    // Validates the table and geometry column before any identifier is
    // interpolated below.
    fetch_column_set(db, table, geometry_column).await?;

    let columns_stmt = columns_statement(table);
    let geometry_stmt = geometry_type_statement(table, geometry_column);
    let bounds_stmt = bounds_statement(table, geometry_column);
    let center_stmt = center_statement(table, geometry_column);

    let (column_rows, geometry_rows, bounds_rows, center_rows) = futures::try_join!(
        db.fetch_rows(&columns_stmt),
        db.fetch_rows(&geometry_stmt),
        db.fetch_rows(&bounds_stmt),
        db.fetch_rows(&center_stmt),
    )?;

    let columns = column_rows
        .iter()
        .filter_map(|row| {
            Some(ColumnInfo {
                name: text_at(row, 0)?.to_string(),
                data_type: text_at(row, 1)?.to_string(),
                description: text_at(row, 2).map(str::to_string),
            })
        })
        .collect();

    let geometry_type = geometry_rows
        .first()
        .and_then(|row| text_at(row, 0))
        .map(str::to_string);

    let bounds = match bounds_rows.first() {
        Some(row) => parse_floats::<4>(row)?,
        None => None,
    };
    let center = match center_rows.first() {
        Some(row) => parse_floats::<2>(row)?,
        None => None,
    };

    Ok(TableMetadata {
        table: table.clone(),
        columns,
        geometry_type,
        bounds,
        center,
    })
}

fn columns_statement(table: &TableRef) -> SqlStatement {
    SqlStatement::with_params(
        "SELECT a.attname::text,
       format_type(a.atttypid, a.atttypmod),
       col_description(a.attrelid, a.attnum)
FROM pg_catalog.pg_attribute AS a
WHERE a.attnum > 0
  AND NOT a.attisdropped
  AND a.attrelid = format('%I.%I', $1::text, $2::text)::regclass
ORDER BY a.attnum",
        vec![
            SqlValue::Text(table.schema.to_string()),
            SqlValue::Text(table.table.to_string()),
        ],
    )
}

fn geometry_type_statement(table: &TableRef, geometry_column: &Identifier) -> SqlStatement {
    SqlStatement::new(format!(
        "SELECT ST_GeometryType(t.{geom})::text FROM {table} AS t WHERE t.{geom} IS NOT NULL LIMIT 1",
        geom = geometry_column.quoted(),
        table = table.qualified_sql(),
    ))
}

fn bounds_statement(table: &TableRef, geometry_column: &Identifier) -> SqlStatement {
    SqlStatement::new(format!(
        "SELECT ST_XMin(e)::text, ST_YMin(e)::text, ST_XMax(e)::text, ST_YMax(e)::text
FROM (SELECT ST_Extent(ST_Transform(t.{geom}, 4326)) AS e FROM {table} AS t) AS extent",
        geom = geometry_column.quoted(),
        table = table.qualified_sql(),
    ))
}

fn center_statement(table: &TableRef, geometry_column: &Identifier) -> SqlStatement {
    SqlStatement::new(format!(
        "SELECT ST_X(c)::text, ST_Y(c)::text
FROM (SELECT ST_Centroid(ST_Collect(ST_Transform(t.{geom}, 4326))) AS c FROM {table} AS t) AS centroid",
        geom = geometry_column.quoted(),
        table = table.qualified_sql(),
    ))
}

fn text_at(row: &DbRow, index: usize) -> Option<&str> {
    row.get(index).and_then(|v| v.as_deref())
}

/// Parse the first `N` columns of `row` as floats.
///
/// All-NULL (an aggregate over an empty table) yields `None`.
fn parse_floats<const N: usize>(row: &DbRow) -> Result<Option<[f64; N]>, CatalogError> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let Some(text) = text_at(row, i) else {
            return Ok(None);
        };
        *slot = text
            .parse()
            .map_err(|_| DatabaseError::Decode(format!("expected a number, got '{text}'")))?;
    }
    Ok(Some(out))
}
