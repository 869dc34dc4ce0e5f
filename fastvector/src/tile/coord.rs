//! XYZ tile coordinates.

use std::fmt;

use thiserror::Error;

/// Highest zoom level accepted.
///
/// `ST_TileEnvelope` works in double precision over the Web Mercator
/// square; beyond zoom 30 the tile size drops below float resolution.
pub const MAX_ZOOM: u8 = 30;

/// Errors from tile coordinate validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level above [`MAX_ZOOM`].
    #[error("zoom level {0} exceeds maximum of {MAX_ZOOM}")]
    InvalidZoom(u32),

    /// Column or row outside `0..2^z`.
    #[error("tile {z}/{x}/{y} is outside the tile grid")]
    OutOfRange { z: u8, x: u32, y: u32 },
}

/// A tile in the XYZ pyramid.
///
/// `x` increases eastward and `y` southward, both in `0..2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Validate and build a tile coordinate.
    ///
    /// # Examples
    ///
    /// ```
    /// use fastvector::tile::TileCoord;
    ///
    /// let tile = TileCoord::new(10, 5, 5).unwrap();
    /// assert_eq!(tile.to_string(), "10/5/5");
    /// assert!(TileCoord::new(1, 2, 0).is_err());
    /// ```
    pub fn new(z: u32, x: u32, y: u32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM as u32 {
            return Err(CoordError::InvalidZoom(z));
        }
        let z = z as u8;
        let tiles_per_side = 1u64 << z;
        if x as u64 >= tiles_per_side || y as u64 >= tiles_per_side {
            return Err(CoordError::OutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
