//! Atomic counters for the tile pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;

/// Counters shared by every request handled by one service.
#[derive(Debug)]
pub struct TileMetrics {
    started: Instant,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_bypassed: AtomicU64,
    cache_write_failures: AtomicU64,
    backend_failures: AtomicU64,
    tiles_served: AtomicU64,
    empty_tiles: AtomicU64,
    bytes_served: AtomicU64,
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_bypassed: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            backend_failures: AtomicU64::new(0),
            tiles_served: AtomicU64::new(0),
            empty_tiles: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
        }
    }
}

impl TileMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A request skipped the cache (projection, filter or zero retention).
    pub fn cache_bypassed(&self) {
        self.cache_bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_write_failed(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_failed(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile of `bytes` length was returned to the caller.
    pub fn tile_served(&self, bytes: u64) {
        self.tiles_served.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
        if bytes == 0 {
            self.empty_tiles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_bypassed: self.cache_bypassed.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            tiles_served: self.tiles_served.load(Ordering::Relaxed),
            empty_tiles: self.empty_tiles.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
        }
    }
}
