//! Tile store interface.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::tile::{TableRef, TileCacheKey};

/// Errors from a tile store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two tables map to the same cache directory.
    #[error("cache directory {dir} belongs to {owner}, not {requested}")]
    TableClash {
        dir: String,
        owner: String,
        requested: String,
    },

    /// The blocking I/O task panicked or was cancelled.
    #[error("cache task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::TaskFailed(err.to_string())
    }
}

/// A cached tile.
///
/// Disk stores hand back the file location so the HTTP layer can stream it
/// without buffering; memory stores hand back the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileBlob {
    Bytes(Bytes),
    File { path: PathBuf, len: u64 },
}

impl TileBlob {
    pub fn len(&self) -> u64 {
        match self {
            TileBlob::Bytes(bytes) => bytes.len() as u64,
            TileBlob::File { len, .. } => *len,
        }
    }

    /// A zero-length tile: the table has no features in it.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the full content.
    pub async fn read(&self) -> Result<Bytes, CacheError> {
        match self {
            TileBlob::Bytes(bytes) => Ok(bytes.clone()),
            TileBlob::File { path, .. } => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

/// Storage for encoded tiles keyed by table and coordinate.
///
/// Implementations must be safe under concurrent use: two writers of the
/// same key may race, and the last complete write wins. Readers never
/// observe a partially written tile.
pub trait TileStore: Send + Sync {
    /// Look up a tile; `Ok(None)` on a miss.
    fn lookup<'a>(
        &'a self,
        key: &'a TileCacheKey,
    ) -> BoxFuture<'a, Result<Option<TileBlob>, CacheError>>;

    /// Store a tile, replacing any previous entry.
    fn store<'a>(&'a self, key: &'a TileCacheKey, blob: Bytes)
        -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove every tile of `table`. Returns `false` if there was nothing to remove.
    fn purge<'a>(&'a self, table: &'a TableRef) -> BoxFuture<'a, Result<bool, CacheError>>;

    /// Total bytes per table cache directory name (`{database}_{schema}_{table}`).
    fn size_report(&self) -> BoxFuture<'_, Result<BTreeMap<String, u64>, CacheError>>;
}
