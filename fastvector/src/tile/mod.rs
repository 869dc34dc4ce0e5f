//! Tile addressing types.
//!
//! Everything that identifies a tile on its way through the pipeline:
//! validated identifiers for database/schema/table/column names, tile
//! coordinates in the XYZ pyramid, the cache key derived from both, and the
//! `TileRequest` handed to the orchestrator.

mod coord;
mod identifier;
mod request;

pub use coord::{CoordError, TileCoord, MAX_ZOOM};
pub use identifier::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN};
pub use request::{parse_fields, TableRef, TileCacheKey, TileRequest};
