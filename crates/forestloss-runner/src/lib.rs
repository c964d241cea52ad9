//! # forestloss-runner
//!
//! Configuration, per-run context and the stage drivers behind the
//! `forestloss` binary.
//!
//! A run goes rasterize → analyse → postprocess. Each stage can also be run
//! on its own against an existing run id: [`rasterize`] saves the run's
//! [`AssetList`] after every chunk, so an interrupted pass can resume from
//! its `next_row`. [`analyse`] reads that list, and [`postprocess`] reads the
//! records exported under the run's prefix.

mod config;
mod context;
mod error;
mod pipeline;
mod telemetry;

pub use config::{BackendConfig, PipelineConfig, YearsConfig};
pub use context::{generate_run_id, PipelineContext};
pub use error::PipelineError;
pub use pipeline::{
    analyse, postprocess, rasterize, run, AssetList, PipelineInputs, RunReport,
};
pub use telemetry::init_tracing;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
