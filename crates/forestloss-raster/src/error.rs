//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when working with grids, layers and masks.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decode or encode error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Grid metadata could not be serialized or parsed.
    #[error("Grid metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Invalid GeoTIFF - missing or inconsistent georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Pixel size string that is not a positive decimal or fraction.
    #[error("Invalid pixel size {0:?}")]
    InvalidPixelSize(String),

    /// Unsupported data type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Pixel buffer length does not match the grid dimensions.
    #[error("Pixel buffer has {actual} values, grid needs {expected}")]
    BufferLength {
        /// Number of pixels the grid has.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// Two grids that must share a lattice do not.
    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    /// Packed mask bytes are truncated or carry the wrong header.
    #[error("Malformed packed mask: {0}")]
    MalformedMask(String),

    /// No asset with the given identifier exists in the store.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// A remote store rejected a request.
    #[error("Remote store error: {0}")]
    Remote(String),
}
