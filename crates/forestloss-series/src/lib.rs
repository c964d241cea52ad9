//! # forestloss-series
//!
//! Post-processing of per-species area records.
//!
//! Each record's baseline and yearly losses are turned into a remaining-cover
//! series ([`CoverSeries`]), from which [`three_generation_loss`] derives the
//! loss over three generation lengths of the species. Rows are appended to one
//! combined CSV ([`OutputTable`]). [`TimeSeriesReconstructor`] drives a whole
//! batch, skipping and reporting species whose rows cannot be computed.

mod error;
mod generation;
mod reconstructor;
mod series;
mod table;
mod window;

pub use error::SeriesError;
pub use generation::GenerationLengthTable;
pub use reconstructor::{reconstruct, ReconstructionSummary, SkippedSpecies, TimeSeriesReconstructor};
pub use series::CoverSeries;
pub use table::{output_header, OutputTable, SeriesRow};
pub use window::{three_generation_loss, ExtrapolationResult, WindowMethod, MIN_LOOKBACK_YEARS};

/// Result type for post-processing operations.
pub type Result<T> = std::result::Result<T, SeriesError>;
