//! Error types for the common crate.

use thiserror::Error;

use crate::{Breeding, LayerLabel, SisId};

/// Errors raised while parsing or validating shared domain values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommonError {
    /// A species identifier was not a non-negative integer.
    #[error("Invalid SIS ID: {0:?}")]
    InvalidSisId(String),

    /// A breeding flag other than 0 or 1.
    #[error("Invalid breeding flag: {0:?} (expected 0 or 1)")]
    InvalidBreedingFlag(String),

    /// A layer label that is neither `<year>_remaining` nor `<year>_loss`.
    #[error("Invalid layer label: {0:?}")]
    InvalidLayerLabel(String),

    /// The final covered year must come after the epoch.
    #[error("Invalid GFC years: final year {final_year} is not after epoch {epoch}")]
    InvalidYears {
        /// Dataset epoch.
        epoch: i32,
        /// Final covered year.
        final_year: i32,
    },

    /// A result record lacks one of the expected layer areas.
    #[error("Result record for {sisid}/{breeding} has no area for layer {label}")]
    MissingLayer {
        /// Species identifier.
        sisid: SisId,
        /// Breeding flag of the record.
        breeding: Breeding,
        /// The label that was expected.
        label: LayerLabel,
    },

    /// An area value that is not a finite number.
    #[error("Result record for {sisid}/{breeding} has a non-finite area for layer {label}")]
    NonFiniteArea {
        /// Species identifier.
        sisid: SisId,
        /// Breeding flag of the record.
        breeding: Breeding,
        /// The offending label.
        label: LayerLabel,
    },

    /// An asset name that does not follow `<sisid>_<breeding>`.
    #[error("Invalid asset name: {0:?}")]
    InvalidAssetName(String),
}
