//! # forestloss-common
//!
//! Domain types shared by every stage of the forest-loss pipeline.
//!
//! - [`SisId`], [`Breeding`] and [`SpeciesKey`] identify one composite range.
//! - [`GfcYears`] and [`LayerLabel`] describe the years covered by the global
//!   forest-change dataset and the labels the remote backend reports areas under.
//! - [`RasterAsset`] is the typed hand-off from the rasterizer to the orchestrator.
//! - [`AreaResultRecord`] / [`ValidatedRecord`] carry per-species areas from the
//!   orchestrator to the time-series reconstructor.

mod asset;
mod error;
mod record;
mod species;
mod years;

pub use asset::RasterAsset;
pub use error::CommonError;
pub use record::{AreaResultRecord, ValidatedRecord};
pub use species::{Breeding, SisId, SpeciesKey};
pub use years::{GfcYears, LayerLabel, HANSEN_EPOCH};

/// Result type for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;
