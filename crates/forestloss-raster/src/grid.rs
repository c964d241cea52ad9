//! Lattice-aligned pixel grids.
//!
//! Every grid in the pipeline sits on one global lattice of fixed pixel size
//! anchored at (0°, 0°). A grid is described by the lattice cell of its
//! lower-left pixel and its extent in pixels, so two grids with the same pixel
//! size can be compared cell-for-cell without floating-point drift.
//!
//! Rows count northward from the lower-left corner: row 0 is the southernmost row.

use serde::{Deserialize, Serialize};

use crate::{RasterError, Result};

/// Relative tolerance when comparing pixel sizes.
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

/// Size of one pixel in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    /// Degrees of longitude per pixel.
    pub width: f64,
    /// Degrees of latitude per pixel.
    pub height: f64,
}

impl PixelSize {
    /// Create a pixel size, rejecting non-positive or non-finite dimensions.
    pub fn new(width: f64, height: f64) -> Result<Self> {
        for value in [width, height] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RasterError::InvalidPixelSize(value.to_string()));
            }
        }
        Ok(Self { width, height })
    }

    /// Parse a pixel size from decimal (`"0.00833"`) or fraction (`"1/120"`) strings.
    pub fn parse(width: &str, height: &str) -> Result<Self> {
        Self::new(parse_degrees(width)?, parse_degrees(height)?)
    }

    /// Whether two pixel sizes describe the same lattice.
    pub fn matches(&self, other: &PixelSize) -> bool {
        close(self.width, other.width) && close(self.height, other.height)
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= PIXEL_SIZE_TOLERANCE * a.abs().max(b.abs())
}

fn parse_degrees(s: &str) -> Result<f64> {
    let invalid = || RasterError::InvalidPixelSize(s.to_string());
    let trimmed = s.trim();

    let value = match trimmed.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().map_err(|_| invalid())?;
            let den: f64 = den.trim().parse().map_err(|_| invalid())?;
            if den == 0.0 {
                return Err(invalid());
            }
            num / den
        }
        None => trimmed.parse().map_err(|_| invalid())?,
    };

    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

/// Geographic bounds of a grid or geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl GridBounds {
    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// A rectangular window of the global pixel lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelGrid {
    /// Pixel size shared by every grid in a run.
    pub pixel: PixelSize,
    /// Lattice column of the westernmost pixel.
    pub col0: i64,
    /// Lattice row of the southernmost pixel.
    pub row0: i64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelGrid {
    /// Create a grid from its lattice origin and extent.
    pub fn new(pixel: PixelSize, col0: i64, row0: i64, width: u32, height: u32) -> Self {
        Self {
            pixel,
            col0,
            row0,
            width,
            height,
        }
    }

    /// The smallest lattice-aligned grid covering `bounds`.
    ///
    /// The lower-left corner of the bounds is snapped down onto the lattice and
    /// the extent is rounded up, so the grid always contains the bounds. A
    /// degenerate (zero-area) bounds still yields one pixel.
    pub fn covering(bounds: &GridBounds, pixel: PixelSize) -> Self {
        let col0 = (bounds.min_lon / pixel.width).floor() as i64;
        let row0 = (bounds.min_lat / pixel.height).floor() as i64;

        let origin_lon = col0 as f64 * pixel.width;
        let origin_lat = row0 as f64 * pixel.height;

        let width = ((bounds.max_lon - origin_lon) / pixel.width).ceil().max(1.0) as u32;
        let height = ((bounds.max_lat - origin_lat) / pixel.height).ceil().max(1.0) as u32;

        Self::new(pixel, col0, row0, width, height)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the grid has no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longitude and latitude of the lower-left corner.
    pub fn origin(&self) -> (f64, f64) {
        (
            self.col0 as f64 * self.pixel.width,
            self.row0 as f64 * self.pixel.height,
        )
    }

    /// Geographic bounds of the whole grid.
    pub fn bounds(&self) -> GridBounds {
        let (min_lon, min_lat) = self.origin();
        GridBounds {
            min_lat,
            max_lat: min_lat + self.height as f64 * self.pixel.height,
            min_lon,
            max_lon: min_lon + self.width as f64 * self.pixel.width,
        }
    }

    /// Row-major index of a pixel (row 0 first).
    pub fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }

    /// Longitude and latitude of a pixel's centre.
    pub fn pixel_centre(&self, col: u32, row: u32) -> (f64, f64) {
        let (min_lon, min_lat) = self.origin();
        (
            min_lon + (col as f64 + 0.5) * self.pixel.width,
            min_lat + (row as f64 + 0.5) * self.pixel.height,
        )
    }

    /// Geographic bounds of a single pixel.
    pub fn pixel_bounds(&self, col: u32, row: u32) -> GridBounds {
        let (min_lon, min_lat) = self.origin();
        let west = min_lon + col as f64 * self.pixel.width;
        let south = min_lat + row as f64 * self.pixel.height;
        GridBounds {
            min_lat: south,
            max_lat: south + self.pixel.height,
            min_lon: west,
            max_lon: west + self.pixel.width,
        }
    }

    /// Fail unless `other` lies on the same lattice.
    pub fn ensure_same_lattice(&self, other: &PixelGrid) -> Result<()> {
        if self.pixel.matches(&other.pixel) {
            Ok(())
        } else {
            Err(RasterError::GridMismatch(format!(
                "pixel size {}x{} differs from {}x{}",
                self.pixel.width, self.pixel.height, other.pixel.width, other.pixel.height
            )))
        }
    }

    /// Locate this grid's pixel `(col, row)` in `other`, which must share the lattice.
    ///
    /// Returns `None` when the pixel falls outside `other`.
    pub fn cell_in(&self, other: &PixelGrid, col: u32, row: u32) -> Option<(u32, u32)> {
        let lattice_col = self.col0 + col as i64;
        let lattice_row = self.row0 + row as i64;

        let other_col = lattice_col - other.col0;
        let other_row = lattice_row - other.row0;

        if other_col < 0
            || other_row < 0
            || other_col >= other.width as i64
            || other_row >= other.height as i64
        {
            return None;
        }
        Some((other_col as u32, other_row as u32))
    }
}
