//! # forestloss-gfc
//!
//! The area stage of the pipeline: for every uploaded range mask, compute the
//! forested area at the baseline year and the area lost in each following
//! year, within the species' altitude band.
//!
//! - [`compose_layers`] builds the labelled layer list from [`GfcYears`](forestloss_common::GfcYears).
//! - [`AltitudeTable`] supplies per-species elevation limits.
//! - [`RemoteJobOrchestrator`] submits one [`AreaJobSpec`] per mask to a
//!   [`ComputeBackend`] and waits for every job to finish.
//! - Jobs export their [`AreaResultRecord`](forestloss_common::AreaResultRecord)
//!   as a CSV object to an [`ObjectStore`]; [`load_export_records`] reads
//!   them back for post-processing.
//!
//! Two backends exist. [`LocalBackend`] computes areas in-process from
//! GeoTIFF layers with [`compute_areas`]. [`HttpBackend`] submits to a remote
//! service, paired with [`HttpRasterStore`] and [`HttpObjectStore`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use forestloss_common::GfcYears;
//! use forestloss_gfc::{
//!     AltitudeTable, AnalysisOptions, DirectoryObjectStore, GfcLayers, LocalBackend,
//!     ReductionOptions, RemoteJobOrchestrator,
//! };
//! use forestloss_raster::DirectoryRasterStore;
//!
//! let layers = GfcLayers::from_paths("gfc/treecover.tif", "gfc/lossyear.tif", "gfc/elevation.tif")?;
//! let rasters = Arc::new(DirectoryRasterStore::new("assets")?);
//! let objects = Arc::new(DirectoryObjectStore::new("exports")?);
//! let backend = Arc::new(LocalBackend::new(layers, rasters, objects));
//!
//! let orchestrator = RemoteJobOrchestrator::new(
//!     backend,
//!     GfcYears::hansen(2019)?,
//!     AnalysisOptions::default(),
//!     ReductionOptions::default(),
//! );
//! let altitude = AltitudeTable::from_path("altitude.csv")?;
//! let jobs = orchestrator.submit_area_jobs(&[], &altitude, "run-1")?;
//! let summary = orchestrator.await_all(&jobs)?;
//! for failure in summary.failures() {
//!     eprintln!("{failure}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod altitude;
mod area;
mod error;
mod export;
mod http;
mod job;
mod layers;
mod local;
mod object_store;
mod orchestrator;

pub use altitude::{AltitudeBand, AltitudeTable, MAX_ALTITUDE};
pub use area::{compute_areas, compute_areas_in_order, Condition, GfcLayers, DEFAULT_ORDER};
pub use error::GfcError;
pub use export::{decode_export, encode_export, export_path, load_export_records};
pub use http::{
    HttpBackend, HttpObjectStore, HttpRasterStore, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, GRID_HEADER,
};
pub use job::{AreaJobSpec, ComputeBackend, JobId, JobState, JobStatus, RemoteJob};
pub use layers::{compose_layers, AnalysisOptions, ForestChangeLayer, LayerKind, ReductionOptions};
pub use local::LocalBackend;
pub use object_store::{is_under_prefix, DirectoryObjectStore, ObjectStore};
pub use orchestrator::{AwaitSummary, JobOutcome, RemoteJobFailure, RemoteJobOrchestrator};

/// Result type for area-stage operations.
pub type Result<T> = std::result::Result<T, GfcError>;
