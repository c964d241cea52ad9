//! # forestloss-raster
//!
//! Raster plumbing shared by the rasterization and area stages.
//!
//! - [`PixelGrid`]: a window of the global pixel lattice. All rasters in a run
//!   share one pixel size, and every grid's origin sits on the lattice, so
//!   independently produced rasters overlay cell-for-cell.
//! - [`GeoLayer`] and [`write_mask_u8`] / [`read_mask_u8`]: single-band
//!   GeoTIFF I/O with ModelTiepoint / ModelPixelScale georeferencing.
//! - [`PackedMask`]: a 1-bit range mask whose background (0) is no-data.
//! - [`RasterStore`]: where uploaded masks live, with a local
//!   [`DirectoryRasterStore`] implementation.
//! - [`row_areas_km2`]: spherical pixel areas.
//!
//! ## Example
//!
//! ```no_run
//! use forestloss_raster::{GeoLayer, GridBounds, PixelGrid, PixelSize};
//!
//! let pixel = PixelSize::parse("1/120", "1/120")?;
//! let grid = PixelGrid::covering(
//!     &GridBounds { min_lat: -2.1, max_lat: -1.4, min_lon: 29.0, max_lon: 29.8 },
//!     pixel,
//! );
//! println!("{} x {} pixels", grid.width, grid.height);
//!
//! let cover = GeoLayer::from_file("gfc/treecover2000.tif")?;
//! let (centre_lon, centre_lat) = grid.pixel_centre(0, 0);
//! println!("cover at ({centre_lon}, {centre_lat}): {:?}", cover.value_at(&grid, 0, 0));
//! # Ok::<(), forestloss_raster::RasterError>(())
//! ```

mod area;
mod error;
mod geotiff;
mod grid;
mod mask;
mod store;

pub use area::{cell_area_km2, row_areas_km2, EARTH_RADIUS_KM};
pub use error::RasterError;
pub use geotiff::{read_mask_u8, write_mask_u8, GeoLayer};
pub use grid::{GridBounds, PixelGrid, PixelSize};
pub use mask::PackedMask;
pub use store::{DirectoryRasterStore, RasterStore};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
