//! Integration tests for the tile pipeline.
//!
//! These tests drive `TileService` end to end against a fake database and a
//! real on-disk cache:
//! - empty tiles are cached and served as 204
//! - filters on unknown columns are rejected before any tile query runs
//! - concurrent first requests for one tile leave exactly one intact file
//! - `fields` and `cql_filter` requests bypass the cache
//! - tables whose cache directory names collide never see each other's tiles
//!
//! Run with: `cargo test --test tile_pipeline_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tempfile::TempDir;

use fastvector::cache::{DiskTileStore, TileBlob, TileStore, TABLE_MARKER};
use fastvector::config::TileSettings;
use fastvector::db::{DatabaseError, DatabaseRegistry, DbRow, SpatialDatabase};
use fastvector::query::SqlStatement;
use fastvector::service::{TileError, TileService};
use fastvector::tile::{Identifier, TableRef, TileCoord, TileRequest};

// ============================================================================
// Helper Functions
// ============================================================================

/// A PostGIS stand-in with a fixed column list and a fixed tile payload.
struct FakeDatabase {
    columns: Vec<&'static str>,
    tile: Vec<u8>,
    delay: Duration,
    tile_queries: AtomicUsize,
}

impl FakeDatabase {
    fn new(columns: &[&'static str], tile: &[u8]) -> Self {
        Self {
            columns: columns.to_vec(),
            tile: tile.to_vec(),
            delay: Duration::ZERO,
            tile_queries: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn tile_queries(&self) -> usize {
        self.tile_queries.load(Ordering::SeqCst)
    }
}

impl SpatialDatabase for FakeDatabase {
    fn fetch_blob<'a>(
        &'a self,
        _statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<u8>, DatabaseError>> {
        Box::pin(async move {
            self.tile_queries.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.tile.clone())
        })
    }

    fn fetch_rows<'a>(
        &'a self,
        _statement: &'a SqlStatement,
    ) -> BoxFuture<'a, Result<Vec<DbRow>, DatabaseError>> {
        let rows = self
            .columns
            .iter()
            .map(|c| vec![Some(c.to_string())])
            .collect();
        Box::pin(async move { Ok(rows) })
    }
}

fn service(db: Arc<FakeDatabase>, cache_dir: &TempDir) -> TileService {
    let mut registry = DatabaseRegistry::new();
    registry.register(Identifier::parse("data").unwrap(), TileSettings::default(), db);
    TileService::new(registry, Arc::new(DiskTileStore::new(cache_dir.path())))
}

fn parks(z: u32, x: u32, y: u32) -> TileRequest {
    TileRequest::new(
        TableRef::new("data", "public", "parks").unwrap(),
        TileCoord::new(z, x, y).unwrap(),
    )
}

/// Tile files under `dir`, recursively. Ownership markers are skipped.
fn files_under(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in std::fs::read_dir(&next).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if !path.ends_with(TABLE_MARKER) {
                found.push(path);
            }
        }
    }
    found
}

// ============================================================================
// Integration Tests
// ============================================================================

/// An empty tile is a 204 on the first call and a cached 204 on the second.
#[tokio::test]
async fn test_empty_tile_is_cached() {
    let cache_dir = TempDir::new().unwrap();
    let db = Arc::new(FakeDatabase::new(&["id", "name", "geom"], b""));
    let service = service(Arc::clone(&db), &cache_dir);

    let first = service.fetch_tile(&parks(10, 5, 5)).await.unwrap();
    assert_eq!(first.status(), 204);
    assert!(first.blob.is_empty());
    assert!(!first.served_from_cache);

    let second = service.fetch_tile(&parks(10, 5, 5)).await.unwrap();
    assert_eq!(second.status(), 204);
    assert!(second.served_from_cache);
    assert_eq!(db.tile_queries(), 1);

    let snapshot = service.metrics().snapshot();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);
}

/// A filter on a column the table lacks is a client error and runs no tile query.
#[tokio::test]
async fn test_filter_on_unknown_column() {
    let cache_dir = TempDir::new().unwrap();
    let db = Arc::new(FakeDatabase::new(&["id", "name", "geom"], b"mvt"));
    let service = service(Arc::clone(&db), &cache_dir);

    let request = parks(10, 5, 5).with_filter("population>1000");
    let err = service.fetch_tile(&request).await.unwrap_err();

    assert!(matches!(err, TileError::UnknownField(ref name) if name == "population"));
    assert!(err.is_client_error());
    assert_eq!(db.tile_queries(), 0);
    assert!(files_under(cache_dir.path()).is_empty());
}

/// Two concurrent first requests both succeed and leave one intact cache file.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests() {
    let cache_dir = TempDir::new().unwrap();
    let payload = vec![0x1a; 64 * 1024];
    let db = Arc::new(
        FakeDatabase::new(&["id", "name", "geom"], &payload).with_delay(Duration::from_millis(50)),
    );
    let service = service(db, &cache_dir);

    let first = parks(12, 2048, 1361);
    let second = parks(12, 2048, 1361);
    let (a, b) = tokio::join!(service.fetch_tile(&first), service.fetch_tile(&second));
    for response in [a.unwrap(), b.unwrap()] {
        assert_eq!(response.status(), 200);
        assert_eq!(response.blob.read().await.unwrap(), payload);
    }

    let files = files_under(cache_dir.path());
    assert_eq!(files.len(), 1, "leftover files: {files:?}");
    assert!(files[0].ends_with("data_public_parks/12/2048/1361"));
    assert_eq!(std::fs::read(&files[0]).unwrap(), payload);

    let cached = service.fetch_tile(&parks(12, 2048, 1361)).await.unwrap();
    assert!(cached.served_from_cache);
    assert!(matches!(cached.blob, TileBlob::File { len, .. } if len == payload.len() as u64));
}

/// Projected and filtered tiles are never read from or written to the cache.
#[tokio::test]
async fn test_fields_and_filter_bypass_cache() {
    let cache_dir = TempDir::new().unwrap();
    let db = Arc::new(FakeDatabase::new(&["id", "name", "geom"], b"mvt"));
    let service = service(Arc::clone(&db), &cache_dir);

    // Warm the cache for the plain tile.
    service.fetch_tile(&parks(3, 2, 5)).await.unwrap();

    let projected = parks(3, 2, 5).with_fields(vec![Identifier::parse("name").unwrap()]);
    let filtered = parks(3, 2, 5).with_filter("name = 'Riverside'");
    for request in [projected, filtered] {
        let response = service.fetch_tile(&request).await.unwrap();
        assert!(!response.served_from_cache);
        assert_eq!(response.max_age, 0);
    }

    assert_eq!(db.tile_queries(), 3);
    assert_eq!(files_under(cache_dir.path()).len(), 1);
    assert_eq!(service.metrics().snapshot().cache_bypassed, 2);
}

/// Purging removes the table's directory and reports usage accordingly.
#[tokio::test]
async fn test_purge_and_usage() {
    let cache_dir = TempDir::new().unwrap();
    let db = Arc::new(FakeDatabase::new(&["id", "geom"], b"0123456789"));
    let service = service(db, &cache_dir);

    service.fetch_tile(&parks(1, 0, 0)).await.unwrap();
    service.fetch_tile(&parks(1, 1, 0)).await.unwrap();

    let usage = service.cache_usage().await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].table, "data_public_parks");
    assert_eq!(usage[0].size_in_bytes, 20);

    let table = TableRef::new("data", "public", "parks").unwrap();
    assert!(service.purge_cache(&table).await.unwrap());
    assert!(!service.purge_cache(&table).await.unwrap());
    assert!(service.cache_usage().await.unwrap().is_empty());

    let store = DiskTileStore::new(cache_dir.path());
    assert!(store.size_report().await.unwrap().is_empty());
}

/// `public.x_parks` and `public_x.parks` share a directory name but not tiles.
#[tokio::test]
async fn test_colliding_directory_names() {
    let cache_dir = TempDir::new().unwrap();
    let db = Arc::new(FakeDatabase::new(&["id", "geom"], b"x_parks tile"));
    let service = service(Arc::clone(&db), &cache_dir);

    let owner = TileRequest::new(
        TableRef::new("data", "public", "x_parks").unwrap(),
        TileCoord::new(1, 0, 0).unwrap(),
    );
    let other = TileRequest::new(
        TableRef::new("data", "public_x", "parks").unwrap(),
        TileCoord::new(1, 0, 0).unwrap(),
    );
    service.fetch_tile(&owner).await.unwrap();

    let response = service.fetch_tile(&other).await.unwrap();
    assert!(!response.served_from_cache);
    assert_eq!(db.tile_queries(), 2);
    // The clashing write is refused but the request still succeeds.
    assert_eq!(service.metrics().snapshot().cache_write_failures, 1);

    assert!(!service.purge_cache(other.table()).await.unwrap());
    let cached = service.fetch_tile(&owner).await.unwrap();
    assert!(cached.served_from_cache);
}
