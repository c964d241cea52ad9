//! Error types for the area-job stage.

use forestloss_common::{CommonError, SpeciesKey};
use forestloss_raster::RasterError;
use thiserror::Error;

/// Errors that can occur while composing, submitting or awaiting area jobs.
#[derive(Debug, Error)]
pub enum GfcError {
    /// I/O error reading a table or writing an object.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON from an HTTP service.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// An HTTP service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Grid, GeoTIFF or raster-store failure.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Invalid identifier, flag or label.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Malformed altitude table or export record.
    #[error("Input format error: {0}")]
    InputFormat(String),

    /// The reduced pixel count of a species exceeds the configured budget.
    #[error("Species {key}: {pixels} pixels after reduction exceeds the budget of {max_pixels}")]
    PixelBudgetExceeded {
        /// Composite range being reduced.
        key: SpeciesKey,
        /// Pixels the reduction would visit.
        pixels: u64,
        /// Configured maximum.
        max_pixels: f64,
    },

    /// The backend does not know the given job.
    #[error("Unknown job {0}")]
    UnknownJob(String),

    /// No object exists at the given path.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Job table lock was poisoned (a thread panicked while holding the lock).
    #[error("Job table lock was poisoned")]
    LockPoisoned,
}
