//! In-memory tile store.

use std::collections::BTreeMap;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::tile::{TableRef, TileCacheKey};

use super::{CacheError, TileBlob, TileStore};

/// Tile store backed by a concurrent map.
///
/// Nothing is persisted; useful for tests and for deployments that would
/// rather recompute tiles after a restart than manage a cache directory.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    entries: DashMap<TileCacheKey, Bytes>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TileStore for MemoryTileStore {
    fn lookup<'a>(
        &'a self,
        key: &'a TileCacheKey,
    ) -> BoxFuture<'a, Result<Option<TileBlob>, CacheError>> {
        let found = self
            .entries
            .get(key)
            .map(|entry| TileBlob::Bytes(entry.value().clone()));
        Box::pin(async move { Ok(found) })
    }

    fn store<'a>(
        &'a self,
        key: &'a TileCacheKey,
        blob: Bytes,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        self.entries.insert(key.clone(), blob);
        Box::pin(async { Ok(()) })
    }

    fn purge<'a>(&'a self, table: &'a TableRef) -> BoxFuture<'a, Result<bool, CacheError>> {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.table != *table);
        let removed = self.entries.len() < before;
        Box::pin(async move { Ok(removed) })
    }

    fn size_report(&self) -> BoxFuture<'_, Result<BTreeMap<String, u64>, CacheError>> {
        let mut report = BTreeMap::new();
        for entry in self.entries.iter() {
            *report.entry(entry.key().table.cache_dir_name()).or_insert(0) +=
                entry.value().len() as u64;
        }
        Box::pin(async move { Ok(report) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileCoord;

    fn key(table: &str, z: u32) -> TileCacheKey {
        TileCacheKey::new(
            TableRef::new("data", "public", table).unwrap(),
            TileCoord::new(z, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_round_trip_and_purge() {
        let store = MemoryTileStore::new();
        store.store(&key("parks", 1), Bytes::from_static(b"abc")).await.unwrap();
        store.store(&key("parks", 2), Bytes::from_static(b"de")).await.unwrap();
        store.store(&key("roads", 1), Bytes::from_static(b"f")).await.unwrap();

        let blob = store.lookup(&key("parks", 1)).await.unwrap().unwrap();
        assert_eq!(blob, TileBlob::Bytes(Bytes::from_static(b"abc")));

        let report = store.size_report().await.unwrap();
        assert_eq!(report["data_public_parks"], 5);
        assert_eq!(report["data_public_roads"], 1);

        let parks = key("parks", 1).table;
        assert!(store.purge(&parks).await.unwrap());
        assert!(!store.purge(&parks).await.unwrap());
        assert_eq!(store.len(), 1);
    }
}
