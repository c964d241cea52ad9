//! Error types for the rasterization stage.

use forestloss_common::{CommonError, SisId, SpeciesKey};
use forestloss_raster::RasterError;
use thiserror::Error;

/// Errors raised while reading, dissolving and rasterizing range maps.
///
/// Every variant raised from the chunk loop names the row range or species
/// it concerns.
#[derive(Debug, Error)]
pub enum RangeError {
    /// I/O error reading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV in the attribute table.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed GeoJSON in the vector source.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Grid, GeoTIFF or raster-store failure.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Invalid identifier or flag.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Malformed vector or attribute data.
    #[error("Input format error: {0}")]
    InputFormat(String),

    /// A species' contiguous record run is longer than a chunk, so the
    /// trailing species cannot be deferred without skipping rows.
    #[error(
        "Resumability gap: rows {start}..{end} all belong to species {sisid}; \
         increase the chunk size above the species' record count"
    )]
    ResumabilityGap {
        /// First row of the chunk.
        start: usize,
        /// One past the last row of the chunk.
        end: usize,
        /// Species occupying the whole chunk.
        sisid: SisId,
    },

    /// A composite range was produced twice in one traversal.
    #[error("Composite range {0} was already uploaded in an earlier chunk (source not grouped by species?)")]
    DuplicateComposite(SpeciesKey),

    /// Chunk size of zero.
    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,
}
