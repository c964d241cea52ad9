//! Per-run state shared by the pipeline stages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use forestloss_common::GfcYears;
use forestloss_gfc::{
    ComputeBackend, DirectoryObjectStore, GfcLayers, HttpBackend, HttpObjectStore, HttpRasterStore,
    LocalBackend, ObjectStore,
};
use forestloss_raster::{DirectoryRasterStore, PixelSize, RasterStore};
use rand::Rng;
use tracing::info;

use crate::{BackendConfig, PipelineConfig, Result};

/// Everything a run needs, built once and passed to each stage.
///
/// The run id scopes the scratch directory, the asset collection and the
/// export prefix, so separate runs never see each other's masks or records.
pub struct PipelineContext {
    run_id: String,
    config: PipelineConfig,
    pixel: PixelSize,
    years: GfcYears,
    rasters: Arc<dyn RasterStore>,
    objects: Arc<dyn ObjectStore>,
}

/// A fresh run identifier: UTC timestamp plus a random suffix.
pub fn generate_run_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{}-{suffix:06x}", Utc::now().format("%Y%m%dT%H%M%S"))
}

impl PipelineContext {
    /// Build a context for a new run.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_run_id(config, generate_run_id())
    }

    /// Build a context for an existing run, to resume it or run a later stage.
    pub fn with_run_id(config: PipelineConfig, run_id: impl Into<String>) -> Result<Self> {
        let run_id = run_id.into();
        config.validate()?;
        let pixel = config.pixel_size()?;
        let years = config.gfc_years()?;

        let rasters: Arc<dyn RasterStore>;
        let objects: Arc<dyn ObjectStore>;
        match &config.backend {
            BackendConfig::Local {
                asset_dir, object_dir, ..
            } => {
                rasters = Arc::new(DirectoryRasterStore::new(asset_dir)?);
                objects = Arc::new(DirectoryObjectStore::new(object_dir)?);
            }
            BackendConfig::Http {
                base_url,
                timeout_secs,
                ..
            } => {
                let timeout = Duration::from_secs(*timeout_secs);
                rasters = Arc::new(HttpRasterStore::new(base_url, timeout)?);
                objects = Arc::new(HttpObjectStore::new(base_url, timeout)?);
            }
        }

        info!(%run_id, "pipeline context ready");
        Ok(Self {
            run_id,
            config,
            pixel,
            years,
            rasters,
            objects,
        })
    }

    /// Run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The configuration the context was built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Lattice pixel size.
    pub fn pixel(&self) -> PixelSize {
        self.pixel
    }

    /// Years covered by the forest-change layers.
    pub fn years(&self) -> GfcYears {
        self.years
    }

    /// Scratch directory of this run.
    pub fn work_dir(&self) -> PathBuf {
        self.config.work_dir.join(&self.run_id)
    }

    /// Where this run's asset list is saved.
    pub fn asset_list_path(&self) -> PathBuf {
        self.work_dir().join("assets.json")
    }

    /// Asset collection this run's masks are uploaded into.
    pub fn asset_collection(&self) -> String {
        join_path(&self.config.asset_collection, &self.run_id)
    }

    /// Object prefix this run's result records are exported under.
    pub fn export_prefix(&self) -> String {
        join_path(&self.config.export_prefix, &self.run_id)
    }

    /// Store the rasterizer uploads masks to.
    pub fn raster_store(&self) -> Arc<dyn RasterStore> {
        Arc::clone(&self.rasters)
    }

    /// Store result records are exported to.
    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.objects)
    }

    /// Connect to the compute backend.
    ///
    /// A local backend loads its GeoTIFF layers here, so stages that do not
    /// compute areas never read them.
    pub fn compute_backend(&self) -> Result<Arc<dyn ComputeBackend>> {
        let backend: Arc<dyn ComputeBackend> = match &self.config.backend {
            BackendConfig::Local {
                treecover,
                lossyear,
                elevation,
                ..
            } => {
                let layers = GfcLayers::from_paths(treecover, lossyear, elevation)?;
                info!(grid = ?layers.treecover.grid(), "loaded forest-change layers");
                Arc::new(LocalBackend::new(layers, self.raster_store(), self.object_store()))
            }
            BackendConfig::Http {
                base_url,
                timeout_secs,
                poll_interval_secs,
            } => Arc::new(HttpBackend::new(
                base_url,
                Duration::from_secs(*timeout_secs),
                Duration::from_secs(*poll_interval_secs),
            )?),
        };
        Ok(backend)
    }
}

fn join_path(prefix: &str, run_id: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        run_id.to_string()
    } else {
        format!("{prefix}/{run_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            work_dir: dir.join("work"),
            backend: BackendConfig::Local {
                treecover: dir.join("treecover.tif"),
                lossyear: dir.join("lossyear.tif"),
                elevation: dir.join("elevation.tif"),
                asset_dir: dir.join("assets"),
                object_dir: dir.join("objects"),
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_scoped_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::with_run_id(local_config(dir.path()), "run-7").unwrap();
        assert_eq!(ctx.run_id(), "run-7");
        assert_eq!(ctx.asset_collection(), "ranges/run-7");
        assert_eq!(ctx.export_prefix(), "exports/run-7");
        assert_eq!(ctx.work_dir(), dir.path().join("work").join("run-7"));
        assert!(dir.path().join("assets").is_dir());
    }

    #[test]
    fn test_generated_run_ids_differ() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), "20260101T000000-abcdef".len());
    }

    #[test]
    fn test_missing_layers_fail_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::with_run_id(local_config(dir.path()), "run-1").unwrap();
        assert!(ctx.compute_backend().is_err());
    }
}
