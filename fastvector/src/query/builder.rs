//! Tile query builder.
//!
//! Produces the single statement PostGIS evaluates for one tile:
//!
//! ```text
//! SELECT ST_AsMVT(tile, <layer>, 4096, 'mvtgeom')
//! FROM (
//!     WITH bounds AS (SELECT ST_TileEnvelope(z, x, y) AS geom)
//!     SELECT ST_AsMVTGeom(...) AS mvtgeom, <columns>
//!     FROM <schema>.<table> AS t, bounds
//!     WHERE ST_Intersects(...) [AND (<filter>)]
//!     LIMIT <max features>
//! ) AS tile
//! ```
//!
//! Tile coordinates and the row cap are typed integers and are rendered
//! inline. Filter values and the layer name are bound parameters.

use thiserror::Error;

use crate::catalog::ColumnSet;
use crate::tile::{Identifier, TileRequest};

use super::{SqlFragment, SqlStatement, SqlValue};

/// Alias of the source table inside the tile query.
pub const TABLE_ALIAS: &str = "t";

/// Tile extent in screen space passed to `ST_AsMVT`.
pub const MVT_EXTENT: u32 = 4096;

/// Errors building a tile query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A projected field is not a column of the table.
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Build the tile statement for `request`.
///
/// # Arguments
///
/// * `request` - Table, tile coordinate and optional projection
/// * `columns` - Catalog columns of the table (the projection allowlist)
/// * `max_features_per_tile` - Row cap from the database configuration
/// * `filter` - Rendered filter clause, placeholders numbered from `$1`
///
/// # Errors
///
/// Returns [`QueryError::UnknownField`] when `request.fields()` names a
/// column outside `columns`.
pub fn build_tile_query(
    request: &TileRequest,
    columns: &ColumnSet,
    max_features_per_tile: u32,
    filter: Option<SqlFragment>,
) -> Result<SqlStatement, QueryError> {
    let projection = resolve_projection(request.fields(), columns)?;
    let geom = format!("{}.{}", TABLE_ALIAS, columns.geometry_column().quoted());
    let coord = request.coord();

    let mut params = Vec::new();
    let mut filter_clause = String::new();
    if let Some(fragment) = filter {
        filter_clause = format!("\n      AND ({})", fragment.sql);
        params = fragment.params;
    }
    params.push(SqlValue::Text(request.table().layer_name()));
    let layer_param = params.len();

    let mut select_list = format!("ST_AsMVTGeom(ST_Transform({geom}, 3857), bounds.geom) AS mvtgeom");
    for column in &projection {
        select_list.push_str(&format!(", {}.{}", TABLE_ALIAS, column.quoted()));
    }

    let sql = format!(
        "SELECT ST_AsMVT(tile, ${layer_param}::text, {MVT_EXTENT}, 'mvtgeom')
FROM (
    WITH bounds AS (
        SELECT ST_TileEnvelope({z}, {x}, {y}) AS geom
    )
    SELECT {select_list}
    FROM {table} AS {TABLE_ALIAS}, bounds
    WHERE ST_Intersects(ST_Transform({geom}, 4326), ST_Transform(bounds.geom, 4326)){filter_clause}
    LIMIT {max_features_per_tile}
) AS tile",
        z = coord.z,
        x = coord.x,
        y = coord.y,
        table = request.table().qualified_sql(),
    );

    Ok(SqlStatement::with_params(sql, params))
}

/// Columns to project: all of them, or the requested subset in request order.
fn resolve_projection<'a>(
    fields: Option<&'a [Identifier]>,
    columns: &'a ColumnSet,
) -> Result<Vec<&'a Identifier>, QueryError> {
    let Some(fields) = fields else {
        return Ok(columns.columns().iter().collect());
    };

    let mut projection: Vec<&Identifier> = Vec::with_capacity(fields.len());
    for field in fields {
        if !columns.contains(field.as_str()) {
            return Err(QueryError::UnknownField(field.to_string()));
        }
        if !projection.contains(&field) {
            projection.push(field);
        }
    }
    Ok(projection)
}
