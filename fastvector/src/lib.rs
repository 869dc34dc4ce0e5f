//! FastVector - Mapbox vector tiles served straight from PostGIS
//!
//! This library turns tile requests (`database/schema/table/z/x/y`, an
//! optional field projection and an optional CQL filter) into a single SQL
//! statement evaluated by PostGIS, and keeps the resulting tiles in an
//! on-disk cache keyed by tile coordinate.
//!
//! # Architecture
//!
//! ```text
//! HTTP request ──► TileService ──► TileStore (hit) ───────────────► bytes / file
//!                      │
//!                      └──(miss)──► catalog ──► filter ──► query ──► SpatialDatabase
//!                                                                        │
//!                      TileStore ◄──(cacheable)──────────────── blob ◄───┘
//! ```
//!
//! The surrounding pieces (configuration, logging, HTTP routing, the
//! connection pool registry) live in their own modules and are wired
//! together by the `fastvector` binary.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod filter;
pub mod logging;
pub mod query;
pub mod server;
pub mod service;
pub mod telemetry;
pub mod tile;

/// Library version, printed by the CLI at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Media type of an encoded Mapbox vector tile.
pub const MVT_MEDIA_TYPE: &str = "application/vnd.mapbox-vector-tile";
