//! Tile cache.
//!
//! Stores encoded tiles keyed by (database, schema, table, z, x, y). Entries
//! never expire; they are removed only by purging a whole table.
//!
//! # Eligibility
//!
//! A request is cached only when it has neither a field projection nor a
//! filter and its database has a positive `cache_age_in_seconds`. Requests
//! that are not eligible neither read from nor write to the store.

mod disk;
mod memory;
mod traits;

pub use disk::{DiskTileStore, TABLE_MARKER};
pub use memory::MemoryTileStore;
pub use traits::{CacheError, TileBlob, TileStore};

use crate::config::TileSettings;
use crate::tile::TileRequest;

/// Whether `request` may be served from and written to the cache.
pub fn is_cache_eligible(request: &TileRequest, settings: &TileSettings) -> bool {
    request.is_cacheable() && settings.caching_enabled()
}
