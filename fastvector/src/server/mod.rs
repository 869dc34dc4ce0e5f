//! HTTP API.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/api/v1/tiles/{db}/{schema}/{table}/{z}/{x}/{y}.pbf` | vector tile |
//! | GET | `/api/v1/tiles/{db}/{schema}/{table}.json` | TileJSON |
//! | GET | `/api/v1/tiles/cache_size` | cache usage per table |
//! | DELETE | `/api/v1/tiles/cache?database=&scheme=&table=` | purge a table's cache |
//! | GET | `/api/v1/table/tables.json` | tables of every database |
//! | GET | `/api/v1/table/{db}/{schema}/{table}.json` | table metadata |
//! | GET | `/api/v1/health_check` | liveness |

mod error;
mod tables;
mod tiles;

pub use error::ApiError;
pub use tiles::TILE_CACHE_HEADER;

use std::future::Future;
use std::io;

use axum::http::{header, HeaderMap};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::TileService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: TileService,
}

impl AppState {
    pub fn new(service: TileService) -> Self {
        Self { service }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health_check", get(health_check))
        .route("/api/v1/tiles/cache_size", get(tiles::get_cache_size))
        .route("/api/v1/tiles/cache", delete(tiles::delete_cache))
        .route(
            "/api/v1/tiles/:database/:scheme/:table",
            get(tiles::get_tilejson),
        )
        .route(
            "/api/v1/tiles/:database/:scheme/:table/:z/:x/:tile",
            get(tiles::get_tile),
        )
        .route("/api/v1/table/tables.json", get(tables::list_tables))
        .route(
            "/api/v1/table/:database/:scheme/:file",
            get(tables::get_table),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

/// `http://{host}` from the request's `Host` header.
fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskTileStore, MemoryTileStore, TileStore};
    use crate::config::TileSettings;
    use crate::db::{DatabaseError, DatabaseRegistry, DbRow, SpatialDatabase};
    use crate::query::SqlStatement;
    use crate::tile::Identifier;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StubDatabase {
        tile: Vec<u8>,
    }

    impl SpatialDatabase for StubDatabase {
        fn fetch_blob<'a>(
            &'a self,
            _statement: &'a SqlStatement,
        ) -> BoxFuture<'a, Result<Vec<u8>, DatabaseError>> {
            let tile = self.tile.clone();
            Box::pin(async move { Ok(tile) })
        }

        fn fetch_rows<'a>(
            &'a self,
            statement: &'a SqlStatement,
        ) -> BoxFuture<'a, Result<Vec<DbRow>, DatabaseError>> {
            let text = |v: &str| Some(v.to_string());
            let rows = if statement.sql.contains("pg_tables") {
                vec![vec![text("public"), text("parks")]]
            } else {
                vec![vec![text("id")], vec![text("name")], vec![text("geom")]]
            };
            Box::pin(async move { Ok(rows) })
        }
    }

    fn app_with(tile: &[u8], store: Arc<dyn TileStore>) -> Router {
        let mut registry = DatabaseRegistry::new();
        registry.register(
            Identifier::parse("data").unwrap(),
            TileSettings::default(),
            Arc::new(StubDatabase {
                tile: tile.to_vec(),
            }),
        );
        router(AppState::new(TileService::new(registry, store)))
    }

    fn app(tile: &[u8]) -> Router {
        app_with(tile, Arc::new(MemoryTileStore::new()))
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "tiles.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = get(app(b""), "/api/v1/health_check").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "UP" }));
    }

    #[tokio::test]
    async fn test_tile_headers() {
        let response = get(app(b"mvt"), "/api/v1/tiles/data/public/parks/3/2/5.pbf").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], crate::MVT_MEDIA_TYPE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=6000");
        assert_eq!(response.headers()[TILE_CACHE_HEADER], "false");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mvt");
    }

    #[tokio::test]
    async fn test_cache_hit_streams_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app_with(b"mvt", Arc::new(DiskTileStore::new(dir.path())));

        let first = get(app.clone(), "/api/v1/tiles/data/public/parks/3/2/5.pbf").await;
        assert_eq!(first.headers()[TILE_CACHE_HEADER], "false");

        let second = get(app, "/api/v1/tiles/data/public/parks/3/2/5.pbf").await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()[TILE_CACHE_HEADER], "true");
        let bytes = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mvt");
    }

    #[tokio::test]
    async fn test_empty_tile_is_204() {
        let response = get(app(b""), "/api/v1/tiles/data/public/parks/0/0/0.pbf").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_cached_empty_tile_is_204() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app_with(b"", Arc::new(DiskTileStore::new(dir.path())));

        let first = get(app.clone(), "/api/v1/tiles/data/public/parks/0/0/0.pbf").await;
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        assert_eq!(first.headers()[TILE_CACHE_HEADER], "false");

        let second = get(app, "/api/v1/tiles/data/public/parks/0/0/0.pbf").await;
        assert_eq!(second.status(), StatusCode::NO_CONTENT);
        assert_eq!(second.headers()[TILE_CACHE_HEADER], "true");
        let bytes = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_tile_has_zero_max_age() {
        let response = get(
            app(b"mvt"),
            "/api/v1/tiles/data/public/parks/3/2/5.pbf?cql_filter=name%20%3D%20%27x%27",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=0");
    }

    #[tokio::test]
    async fn test_client_errors() {
        let cases = [
            ("/api/v1/tiles/data/public/parks/3/9/5.pbf", StatusCode::BAD_REQUEST),
            ("/api/v1/tiles/data/public/parks/x/2/5.pbf", StatusCode::BAD_REQUEST),
            ("/api/v1/tiles/data/public/parks/3/2/5.png", StatusCode::NOT_FOUND),
            ("/api/v1/tiles/data/public/parks%3B/3/2/5.pbf", StatusCode::BAD_REQUEST),
            ("/api/v1/tiles/nope/public/parks/3/2/5.pbf", StatusCode::NOT_FOUND),
            (
                "/api/v1/tiles/data/public/parks/3/2/5.pbf?fields=secret",
                StatusCode::BAD_REQUEST,
            ),
            (
                "/api/v1/tiles/data/public/parks/3/2/5.pbf?cql_filter=name%20%3E",
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (uri, expected) in cases {
            let response = get(app(b"mvt"), uri).await;
            assert_eq!(response.status(), expected, "{uri}");
            let body = json_body(response).await;
            assert!(body["detail"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_tilejson() {
        let response = get(app(b""), "/api/v1/tiles/data/public/parks.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["tilejson"], "2.2.0");
        assert_eq!(body["name"], "public.parks");
        assert_eq!(body["scheme"], "xyz");
        assert_eq!(
            body["tiles"][0],
            "http://tiles.example.com/api/v1/tiles/data/public/parks/{z}/{x}/{y}.pbf"
        );
        assert_eq!(body["maxzoom"], 22);
    }

    #[tokio::test]
    async fn test_cache_size_and_purge() {
        let app = app(b"0123456789");
        get(app.clone(), "/api/v1/tiles/data/public/parks/1/0/0.pbf").await;

        let body = json_body(get(app.clone(), "/api/v1/tiles/cache_size").await).await;
        assert_eq!(body[0]["table"], "data_public_parks");
        assert_eq!(body[0]["size_in_bytes"], 10);

        let purge = || {
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/tiles/cache?database=data&scheme=public&table=parks")
                .body(Body::empty())
                .unwrap()
        };
        let first = json_body(app.clone().oneshot(purge()).await.unwrap()).await;
        assert_eq!(first, json!({ "status": "deleted" }));
        let second = json_body(app.oneshot(purge()).await.unwrap()).await;
        assert_eq!(second, json!({ "error": "No cache at data_public_parks" }));
    }

    #[tokio::test]
    async fn test_table_listing() {
        let body = json_body(get(app(b""), "/api/v1/table/tables.json").await).await;
        assert_eq!(body[0]["id"], "public.parks");
        assert_eq!(body[0]["database"], "data");
        assert_eq!(
            body[0]["detailurl"],
            "http://tiles.example.com/api/v1/table/data/public/parks.json"
        );
    }
}
