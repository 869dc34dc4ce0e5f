//! Point-in-time copy of the tile counters.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub uptime_secs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_bypassed: u64,
    pub cache_write_failures: u64,
    pub backend_failures: u64,
    pub tiles_served: u64,
    pub empty_tiles: u64,
    pub bytes_served: u64,
}

impl TelemetrySnapshot {
    /// Fraction of cache-eligible requests answered from the cache.
    ///
    /// `0.0` before the first eligible request.
    pub fn hit_rate(&self) -> f64 {
        let eligible = self.cache_hits + self.cache_misses;
        if eligible == 0 {
            0.0
        } else {
            self.cache_hits as f64 / eligible as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tiles served ({} empty, {} bytes), cache hit rate {:.1}%, {} bypassed, {} write failures, {} backend failures",
            self.tiles_served,
            self.empty_tiles,
            self.bytes_served,
            self.hit_rate() * 100.0,
            self.cache_bypassed,
            self.cache_write_failures,
            self.backend_failures
        )
    }
}
