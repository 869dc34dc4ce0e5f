//! Tile routes: tiles, TileJSON and cache management.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::cache::{CacheError, TileBlob};
use crate::service::{CacheUsage, TileError, TileResponse};
use crate::tile::{parse_fields, TableRef, TileCoord, TileRequest};
use crate::MVT_MEDIA_TYPE;

use super::{base_url, ApiError, AppState};

/// Response header telling whether the tile came from the cache.
pub const TILE_CACHE_HEADER: &str = "tile-cache";

const TILEJSON_VERSION: &str = "2.2.0";
const MIN_ZOOM: u8 = 0;
const MAX_ZOOM: u8 = 22;

#[derive(Debug, Default, Deserialize)]
pub struct TileQuery {
    pub fields: Option<String>,
    pub cql_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub database: String,
    pub scheme: String,
    pub table: String,
}

/// `GET /api/v1/tiles/:database/:scheme/:table/:z/:x/:tile` where `tile` is `{y}.pbf`.
pub async fn get_tile(
    State(state): State<AppState>,
    Path((database, scheme, table, z, x, tile)): Path<(String, String, String, String, String, String)>,
    Query(query): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let y = tile
        .strip_suffix(".pbf")
        .ok_or_else(|| ApiError::not_found(format!("no such tile '{tile}'")))?;
    let coord = TileCoord::new(
        parse_ordinate("z", &z)?,
        parse_ordinate("x", &x)?,
        parse_ordinate("y", y)?,
    )?;

    let mut request = TileRequest::new(TableRef::new(&database, &scheme, &table)?, coord);
    if let Some(fields) = query.fields {
        request = request.with_fields(parse_fields(&fields)?);
    }
    if let Some(filter) = query.cql_filter {
        request = request.with_filter(filter);
    }

    let response = state.service.fetch_tile(&request).await?;
    tile_response(response).await
}

fn parse_ordinate(name: &str, raw: &str) -> Result<u32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("{name} must be a non-negative integer, got '{raw}'")))
}

async fn tile_response(response: TileResponse) -> Result<Response, ApiError> {
    let status = if response.status() == 204 {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::OK
    };

    let body = match &response.blob {
        _ if status == StatusCode::NO_CONTENT => Body::empty(),
        TileBlob::Bytes(bytes) => Body::from(bytes.clone()),
        TileBlob::File { path, .. } => match tokio::fs::File::open(path).await {
            Ok(file) => Body::from_stream(ReaderStream::new(file)),
            Err(e) => {
                // Purged between lookup and open.
                warn!(path = %path.display(), error = %e, "Cached tile vanished");
                return Err(TileError::CacheIoFailed(CacheError::Io(e)).into());
            }
        },
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MVT_MEDIA_TYPE));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(&format!("max-age={}", response.max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("max-age=0")),
    );
    headers.insert(
        TILE_CACHE_HEADER,
        HeaderValue::from_static(if response.served_from_cache { "true" } else { "false" }),
    );

    Ok((status, headers, body).into_response())
}

/// `GET /api/v1/tiles/:database/:scheme/:table` where the last segment is `{table}.json`.
pub async fn get_tilejson(
    State(state): State<AppState>,
    Path((database, scheme, file)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let table = file
        .strip_suffix(".json")
        .ok_or_else(|| ApiError::not_found(format!("no such resource '{file}'")))?;
    let table = TableRef::new(&database, &scheme, table)?;
    if state.service.registry().get(&table.database).is_none() {
        return Err(TileError::UnknownDatabase(database).into());
    }

    Ok(Json(json!({
        "tilejson": TILEJSON_VERSION,
        "name": table.layer_name(),
        "version": "1.0.0",
        "scheme": "xyz",
        "tiles": [tile_url(&base_url(&headers), &table)],
        "minzoom": MIN_ZOOM,
        "maxzoom": MAX_ZOOM,
    })))
}

/// Tile URL template for `table` under `base`.
pub fn tile_url(base: &str, table: &TableRef) -> String {
    format!(
        "{base}/api/v1/tiles/{}/{}/{}/{{z}}/{{x}}/{{y}}.pbf",
        table.database, table.schema, table.table
    )
}

/// `GET /api/v1/tiles/cache_size`
pub async fn get_cache_size(State(state): State<AppState>) -> Result<Json<Vec<CacheUsage>>, ApiError> {
    Ok(Json(state.service.cache_usage().await?))
}

/// `DELETE /api/v1/tiles/cache?database=&scheme=&table=`
pub async fn delete_cache(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<Value>, ApiError> {
    let table = TableRef::new(&query.database, &query.scheme, &query.table)?;
    if state.service.purge_cache(&table).await? {
        Ok(Json(json!({ "status": "deleted" })))
    } else {
        Ok(Json(json!({
            "error": format!("No cache at {}", table.cache_dir_name())
        })))
    }
}
