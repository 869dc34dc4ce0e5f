//! Tile pipeline telemetry.
//!
//! Lock-free counters updated by the orchestrator on every request, and a
//! serializable point-in-time copy for the CLI and HTTP layers.
//!
//! ```text
//! TileService ─────► TileMetrics ─────► TelemetrySnapshot ─────► logs, JSON
//!                    (atomic counters)   (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use fastvector::telemetry::TileMetrics;
//!
//! let metrics = TileMetrics::new();
//! metrics.cache_miss();
//! metrics.tile_served(512);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.cache_misses, 1);
//! assert_eq!(snapshot.bytes_served, 512);
//! ```

mod metrics;
mod snapshot;

pub use metrics::TileMetrics;
pub use snapshot::TelemetrySnapshot;
