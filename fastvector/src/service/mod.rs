//! Tile fetch orchestration.
//!
//! [`TileService`] ties the pipeline together:
//!
//! 1. Cache-eligible requests are looked up in the [`TileStore`]; a hit is
//!    returned without touching the database.
//! 2. Otherwise the table's columns are fetched from the catalog, the
//!    filter is translated, and the tile statement is built and executed
//!    on a pooled connection.
//! 3. Cache-eligible results are written back before returning. A failed
//!    write is logged and counted but does not fail the request.
//!
//! Table listing and metadata requests go straight to the catalog.

mod error;

pub use error::TileError;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::cache::{is_cache_eligible, TileBlob, TileStore};
use crate::catalog::{self, fetch_column_set, TableMetadata};
use crate::db::{DatabaseHandle, DatabaseRegistry};
use crate::filter::translate;
use crate::query::{build_tile_query, SqlStatement};
use crate::telemetry::TileMetrics;
use crate::tile::{Identifier, TableRef, TileRequest};

const BYTES_PER_GIGABYTE: f64 = 1_000_000_000.0;

/// A served tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResponse {
    pub blob: TileBlob,
    pub served_from_cache: bool,
    /// Value for `Cache-Control: max-age`.
    pub max_age: u64,
}

impl TileResponse {
    /// 204 for an empty tile, 200 otherwise.
    pub fn status(&self) -> u16 {
        if self.blob.is_empty() {
            204
        } else {
            200
        }
    }
}

/// Disk usage of one table's cached tiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheUsage {
    /// Cache directory name, `{database}_{schema}_{table}`.
    pub table: String,
    pub size_in_bytes: u64,
    pub size_in_gigabytes: f64,
}

/// The tile fetch orchestrator.
#[derive(Clone)]
pub struct TileService {
    registry: DatabaseRegistry,
    store: Arc<dyn TileStore>,
    metrics: Arc<TileMetrics>,
}

impl TileService {
    pub fn new(registry: DatabaseRegistry, store: Arc<dyn TileStore>) -> Self {
        Self {
            registry,
            store,
            metrics: Arc::new(TileMetrics::new()),
        }
    }

    /// Share an existing metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<TileMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &DatabaseRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<TileMetrics> {
        &self.metrics
    }

    fn handle(&self, database: &Identifier) -> Result<&DatabaseHandle, TileError> {
        self.registry
            .get(database)
            .ok_or_else(|| TileError::UnknownDatabase(database.to_string()))
    }

    /// Serve one tile.
    ///
    /// # Errors
    ///
    /// Client errors for unknown databases, tables or fields and for bad
    /// filters; [`TileError::BackendQueryFailed`] when the database fails;
    /// [`TileError::CacheIoFailed`] when a cached tile cannot be read.
    #[instrument(skip(self, request), fields(table = %request.table(), tile = %request.coord()))]
    pub async fn fetch_tile(&self, request: &TileRequest) -> Result<TileResponse, TileError> {
        let handle = self.handle(&request.table().database)?;
        let settings = handle.settings();
        let eligible = is_cache_eligible(request, settings);
        let max_age = if request.is_cacheable() {
            settings.cache_age_in_seconds
        } else {
            0
        };

        if eligible {
            let key = request.cache_key();
            match self.store.lookup(&key).await {
                Ok(Some(blob)) => {
                    debug!(bytes = blob.len(), "Cache hit");
                    self.metrics.cache_hit();
                    self.metrics.tile_served(blob.len());
                    return Ok(TileResponse {
                        blob,
                        served_from_cache: true,
                        max_age,
                    });
                }
                Ok(None) => {
                    debug!("Cache miss");
                    self.metrics.cache_miss();
                }
                Err(e) => {
                    error!(error = %e, "Failed to read tile cache");
                    return Err(TileError::CacheIoFailed(e));
                }
            }
        } else {
            self.metrics.cache_bypassed();
        }

        let bytes = match self.render(handle, request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if let TileError::BackendQueryFailed(cause) = &e {
                    self.metrics.backend_failed();
                    warn!(error = %cause, "Tile query failed");
                }
                return Err(e);
            }
        };

        if eligible {
            if let Err(e) = self.store.store(&request.cache_key(), bytes.clone()).await {
                self.metrics.cache_write_failed();
                warn!(error = %e, "Failed to write tile to cache");
            }
        }

        debug!(bytes = bytes.len(), "Rendered tile");
        self.metrics.tile_served(bytes.len() as u64);
        Ok(TileResponse {
            blob: TileBlob::Bytes(bytes),
            served_from_cache: false,
            max_age,
        })
    }

    async fn render(
        &self,
        handle: &DatabaseHandle,
        request: &TileRequest,
    ) -> Result<Bytes, TileError> {
        let statement = self.statement(handle, request).await?;
        let blob = handle.database().fetch_blob(&statement).await?;
        Ok(Bytes::from(blob))
    }

    /// Build the tile statement after validating the request against the catalog.
    async fn statement(
        &self,
        handle: &DatabaseHandle,
        request: &TileRequest,
    ) -> Result<SqlStatement, TileError> {
        let settings = handle.settings();
        let columns =
            fetch_column_set(handle.database(), request.table(), &settings.geometry_column).await?;
        let filter = match request.filter() {
            Some(expression) => translate(expression, &columns)?,
            None => None,
        };
        Ok(build_tile_query(
            request,
            &columns,
            settings.max_features_per_tile,
            filter,
        )?)
    }

    /// Delete every cached tile of `table`. `false` when nothing was cached.
    pub async fn purge_cache(&self, table: &TableRef) -> Result<bool, TileError> {
        Ok(self.store.purge(table).await?)
    }

    /// Cache usage per table directory, in name order.
    pub async fn cache_usage(&self) -> Result<Vec<CacheUsage>, TileError> {
        let report = self.store.size_report().await?;
        Ok(report
            .into_iter()
            .map(|(table, size_in_bytes)| CacheUsage {
                table,
                size_in_bytes,
                size_in_gigabytes: size_in_bytes as f64 / BYTES_PER_GIGABYTE,
            })
            .collect())
    }

    /// Every user table of every configured database.
    pub async fn list_tables(&self) -> Result<Vec<TableRef>, TileError> {
        let mut tables = Vec::new();
        for (name, handle) in self.registry.iter() {
            tables.extend(catalog::list_tables(handle.database(), name).await?);
        }
        Ok(tables)
    }

    /// Columns, geometry type, bounds and center of one table.
    pub async fn table_metadata(&self, table: &TableRef) -> Result<TableMetadata, TileError> {
        let handle = self.handle(&table.database)?;
        let metadata = catalog::fetch_table_metadata(
            handle.database(),
            table,
            &handle.settings().geometry_column,
        )
        .await?;
        Ok(metadata)
    }
}
