//! Error types for the post-processing stage.

use forestloss_common::{CommonError, SpeciesKey};
use thiserror::Error;

/// Errors that can occur while reconstructing series and writing the output table.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// I/O error reading a table or writing the output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A result record that is missing layers or carries non-finite areas.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Malformed generation-length table.
    #[error("Input format error: {0}")]
    InputFormat(String),

    /// The species has no generation length.
    #[error("Species {key} ({sci_name}) has no generation length")]
    MissingGenerationLength {
        /// Composite range being reconstructed.
        key: SpeciesKey,
        /// Name looked up in the table.
        sci_name: String,
    },

    /// The loss percentage or interpolation window is undefined for the species.
    #[error("Species {key}: {reason}")]
    ArithmeticDomain {
        /// Composite range being reconstructed.
        key: SpeciesKey,
        /// What was undefined.
        reason: String,
    },
}

impl SeriesError {
    /// Short reason used as a metric label when a species is skipped.
    pub fn skip_reason(&self) -> &'static str {
        match self {
            SeriesError::Common(_) => "invalid_record",
            SeriesError::MissingGenerationLength { .. } => "missing_generation_length",
            SeriesError::ArithmeticDomain { .. } => "arithmetic_domain",
            _ => "other",
        }
    }
}
