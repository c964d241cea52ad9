//! Error types for the pipeline runner.

use thiserror::Error;

/// Errors that can end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// I/O error reading inputs or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML configuration.
    #[error("Configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed asset list.
    #[error("Asset list error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid shared domain value.
    #[error(transparent)]
    Common(#[from] forestloss_common::CommonError),

    /// Raster store or GeoTIFF failure.
    #[error(transparent)]
    Raster(#[from] forestloss_raster::RasterError),

    /// Rasterization stage failure.
    #[error("Rasterize stage: {0}")]
    Range(#[from] forestloss_range::RangeError),

    /// Area stage failure.
    #[error("Analyse stage: {0}")]
    Gfc(#[from] forestloss_gfc::GfcError),

    /// Post-processing stage failure.
    #[error("Post-process stage: {0}")]
    Series(#[from] forestloss_series::SeriesError),
}
