//! On-disk tile store.
//!
//! Layout: `{root}/{database}_{schema}_{table}/{z}/{x}/{y}`, one file per
//! tile holding the encoded bytes verbatim. Every path component comes from
//! a validated identifier or an integer, so no request can address a file
//! outside the root.
//!
//! Underscores in names make the directory name ambiguous (`public/x_parks`
//! and `public_x/parks` share one), so each table directory carries a
//! [`TABLE_MARKER`] file naming the table that owns it. Lookups and purges
//! for any other table treat the directory as absent.
//!
//! All filesystem work runs on tokio's blocking pool.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::BoxFuture;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::tile::{TableRef, TileCacheKey};

use super::{CacheError, TileBlob, TileStore};

/// File in each table directory holding the owning table, `db/schema.table`.
pub const TABLE_MARKER: &str = ".table";

/// Who owns a table directory.
#[derive(Debug, PartialEq, Eq)]
enum Ownership {
    Absent,
    Owner(String),
}

impl Ownership {
    fn read(dir: &Path) -> io::Result<Self> {
        match fs::read_to_string(dir.join(TABLE_MARKER)) {
            Ok(owner) => Ok(Ownership::Owner(owner.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Ownership::Absent),
            Err(e) => Err(e),
        }
    }

    fn is(&self, table: &TableRef) -> bool {
        matches!(self, Ownership::Owner(owner) if *owner == table.to_string())
    }
}

/// Tile store rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskTileStore {
    root: PathBuf,
}

impl DiskTileStore {
    /// Create a store under `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every tile of `table`.
    pub fn table_dir(&self, table: &TableRef) -> PathBuf {
        self.root.join(table.cache_dir_name())
    }

    /// File path of one tile.
    pub fn tile_path(&self, key: &TileCacheKey) -> PathBuf {
        self.table_dir(&key.table)
            .join(key.coord.z.to_string())
            .join(key.coord.x.to_string())
            .join(key.coord.y.to_string())
    }
}

impl TileStore for DiskTileStore {
    fn lookup<'a>(
        &'a self,
        key: &'a TileCacheKey,
    ) -> BoxFuture<'a, Result<Option<TileBlob>, CacheError>> {
        let dir = self.table_dir(&key.table);
        let path = self.tile_path(key);
        let table = key.table.clone();
        Box::pin(async move {
            let found = tokio::task::spawn_blocking(move || {
                if !Ownership::read(&dir)?.is(&table) {
                    return Ok(None);
                }
                match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => Ok(Some(TileBlob::File {
                        path,
                        len: meta.len(),
                    })),
                    Ok(_) => Ok(None),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await??;
            Ok(found)
        })
    }

    fn store<'a>(
        &'a self,
        key: &'a TileCacheKey,
        blob: Bytes,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        let dir = self.table_dir(&key.table);
        let path = self.tile_path(key);
        let table = key.table.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                claim_table_dir(&dir, &table)?;
                write_atomic(&path, &blob)?;
                Ok::<_, CacheError>(())
            })
            .await??;
            debug!(key = %key, "Stored tile");
            Ok(())
        })
    }

    fn purge<'a>(&'a self, table: &'a TableRef) -> BoxFuture<'a, Result<bool, CacheError>> {
        let dir = self.table_dir(table);
        let owned = table.clone();
        Box::pin(async move {
            let removed = tokio::task::spawn_blocking(move || {
                // An unmarked directory predates ownership markers and is removed.
                if let Ownership::Owner(owner) = Ownership::read(&dir)? {
                    if owner != owned.to_string() {
                        debug!(table = %owned, owner = %owner, "Cache directory owned by another table");
                        return Ok(false);
                    }
                }
                match fs::remove_dir_all(&dir) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await??;
            if removed {
                info!(table = %table, "Purged tile cache");
            }
            Ok(removed)
        })
    }

    fn size_report(&self) -> BoxFuture<'_, Result<BTreeMap<String, u64>, CacheError>> {
        let root = self.root.clone();
        Box::pin(async move {
            let report = tokio::task::spawn_blocking(move || size_by_table(&root)).await??;
            Ok(report)
        })
    }
}

/// Mark `dir` as holding `table`'s tiles, or fail if another table owns it.
fn claim_table_dir(dir: &Path, table: &TableRef) -> Result<(), CacheError> {
    match Ownership::read(dir)? {
        Ownership::Absent => {
            write_atomic(&dir.join(TABLE_MARKER), table.to_string().as_bytes())?;
            Ok(())
        }
        owner if owner.is(table) => Ok(()),
        Ownership::Owner(owner) => Err(CacheError::TableClash {
            dir: dir.display().to_string(),
            owner,
            requested: table.to_string(),
        }),
    }
}

/// Write `data` to `path` through a temp file in the same directory.
///
/// The rename is atomic on the same filesystem, so readers see either the
/// old tile or the new one.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tile path has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn size_by_table(root: &Path) -> io::Result<BTreeMap<String, u64>> {
    let mut report = BTreeMap::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        report.insert(name, dir_size(&entry.path())?);
    }
    Ok(report)
}

/// Sum of tile file sizes under `dir`. Symlinks are not followed.
fn dir_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() && entry.file_name() != TABLE_MARKER {
                total += entry.metadata()?.len();
            }
        }
    }
    Ok(total)
}
