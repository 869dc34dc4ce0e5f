//! Table routes: listing and per-table metadata.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::tile::TableRef;

use super::tiles::tile_url;
use super::{base_url, ApiError, AppState};

/// `GET /api/v1/table/tables.json`
pub async fn list_tables(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let base = base_url(&headers);
    let tables = state.service.list_tables().await?;
    Ok(Json(
        tables
            .iter()
            .map(|table| {
                json!({
                    "name": table.table.as_str(),
                    "schema": table.schema.as_str(),
                    "type": "table",
                    "id": table.layer_name(),
                    "database": table.database.as_str(),
                    "detailurl": format!(
                        "{base}/api/v1/table/{}/{}/{}.json",
                        table.database, table.schema, table.table
                    ),
                })
            })
            .collect(),
    ))
}

/// `GET /api/v1/table/:database/:scheme/:file` where `file` is `{table}.json`.
pub async fn get_table(
    State(state): State<AppState>,
    Path((database, scheme, file)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let table = file
        .strip_suffix(".json")
        .ok_or_else(|| ApiError::not_found(format!("no such resource '{file}'")))?;
    let table = TableRef::new(&database, &scheme, table)?;
    let metadata = state.service.table_metadata(&table).await?;

    Ok(Json(json!({
        "id": table.layer_name(),
        "schema": table.schema.as_str(),
        "tileurl": tile_url(&base_url(&headers), &table),
        "properties": metadata.columns,
        "geometrytype": metadata.geometry_type,
        "type": "table",
        "minzoom": 0,
        "maxzoom": 22,
        "bounds": metadata.bounds,
        "center": metadata.center,
    })))
}
