//! YAML pipeline configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```yaml
//! pixel_width: "1/120"
//! pixel_height: "1/120"
//! chunk_size: 50
//! years:
//!   epoch: 2000
//!   final_year: 2019
//! analysis:
//!   canopy_threshold: 0.5
//! reduction:
//!   scale_m: 600
//!   max_pixels: 1.0e13
//! containment: pixel_centre
//! work_dir: work
//! backend:
//!   type: local
//!   treecover: gfc/treecover2000.tif
//!   lossyear: gfc/lossyear.tif
//!   elevation: gfc/elevation.tif
//! ```

use std::path::{Path, PathBuf};

use forestloss_common::{GfcYears, HANSEN_EPOCH};
use forestloss_gfc::{AnalysisOptions, ReductionOptions, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use forestloss_range::{ContainmentRule, DEFAULT_CHUNK_SIZE};
use forestloss_raster::PixelSize;
use serde::{Deserialize, Serialize};

use crate::{PipelineError, Result};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pixel width in degrees, as a decimal or a fraction such as `"1/120"`.
    pub pixel_width: String,
    /// Pixel height in degrees.
    pub pixel_height: String,
    /// Rows read per rasterization chunk.
    pub chunk_size: usize,
    /// Years covered by the forest-change layers.
    pub years: YearsConfig,
    /// Canopy threshold.
    pub analysis: AnalysisOptions,
    /// Resolution reduction and pixel budget.
    pub reduction: ReductionOptions,
    /// Which pixels count as inside a range.
    pub containment: ContainmentRule,
    /// Root of per-run scratch directories.
    pub work_dir: PathBuf,
    /// Asset collection masks are uploaded into; the run id is appended.
    pub asset_collection: String,
    /// Object prefix result records are exported under; the run id is appended.
    pub export_prefix: String,
    /// Where area jobs run and results are stored.
    pub backend: BackendConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pixel_width: "1/120".to_string(),
            pixel_height: "1/120".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            years: YearsConfig::default(),
            analysis: AnalysisOptions::default(),
            reduction: ReductionOptions::default(),
            containment: ContainmentRule::default(),
            work_dir: PathBuf::from("work"),
            asset_collection: "ranges".to_string(),
            export_prefix: "exports".to_string(),
            backend: BackendConfig::default(),
        }
    }
}

/// Epoch and final year of the forest-change dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearsConfig {
    /// Baseline canopy year.
    pub epoch: i32,
    /// Final year with loss data.
    pub final_year: i32,
}

impl Default for YearsConfig {
    fn default() -> Self {
        Self {
            epoch: HANSEN_EPOCH,
            final_year: 2019,
        }
    }
}

/// Compute backend and stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Compute in-process from local GeoTIFFs, with directory stores.
    Local {
        /// Canopy cover GeoTIFF (percent).
        treecover: PathBuf,
        /// Loss-year GeoTIFF.
        lossyear: PathBuf,
        /// Elevation GeoTIFF (metres).
        elevation: PathBuf,
        /// Directory holding uploaded masks.
        #[serde(default = "default_asset_dir")]
        asset_dir: PathBuf,
        /// Directory holding exported result records.
        #[serde(default = "default_object_dir")]
        object_dir: PathBuf,
    },
    /// A remote service speaking the HTTP JSON API.
    Http {
        /// Service root URL.
        base_url: String,
        /// Per-request timeout in seconds.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        /// Seconds between job status polls.
        #[serde(default = "default_poll_interval_secs")]
        poll_interval_secs: u64,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            treecover: PathBuf::from("gfc/treecover2000.tif"),
            lossyear: PathBuf::from("gfc/lossyear.tif"),
            elevation: PathBuf::from("gfc/elevation.tif"),
            asset_dir: default_asset_dir(),
            object_dir: default_object_dir(),
        }
    }
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("store/assets")
}

fn default_object_dir() -> PathBuf {
    PathBuf::from("store/objects")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

impl PipelineConfig {
    /// Load a configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text and validate it.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty map.
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system does not.
    pub fn validate(&self) -> Result<()> {
        self.pixel_size()?;
        self.gfc_years()?;
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.analysis.canopy_threshold) {
            return Err(PipelineError::Config(format!(
                "canopy_threshold {} is not a fraction",
                self.analysis.canopy_threshold
            )));
        }
        if self.reduction.max_pixels <= 0.0 {
            return Err(PipelineError::Config("max_pixels must be positive".to_string()));
        }
        Ok(())
    }

    /// Lattice pixel size.
    pub fn pixel_size(&self) -> Result<PixelSize> {
        Ok(PixelSize::parse(&self.pixel_width, &self.pixel_height)?)
    }

    /// Years covered by the forest-change layers.
    pub fn gfc_years(&self) -> Result<GfcYears> {
        Ok(GfcYears::new(self.years.epoch, self.years.final_year)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.analysis.canopy_threshold, 0.5);
        assert_eq!(config.reduction.scale_m, 600.0);
        assert_eq!(config.gfc_years().unwrap().first_year(), 2001);
    }

    #[test]
    fn test_partial_config() {
        let yaml = "
pixel_width: '0.25'
pixel_height: '0.25'
chunk_size: 10
years:
  final_year: 2005
containment: any_overlap
backend:
  type: http
  base_url: http://localhost:8080
";
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.years.epoch, 2000);
        assert_eq!(config.years.final_year, 2005);
        assert_eq!(config.containment, ContainmentRule::AnyOverlap);
        assert_eq!(config.pixel_size().unwrap().width, 0.25);
        assert_eq!(
            config.backend,
            BackendConfig::Http {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 60,
                poll_interval_secs: 10,
            }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_yaml_str("chunk_size: 0").is_err());
        assert!(PipelineConfig::from_yaml_str("pixel_width: '1/0'").is_err());
        assert!(PipelineConfig::from_yaml_str("years: {epoch: 2000, final_year: 1999}").is_err());
        assert!(PipelineConfig::from_yaml_str("analysis: {canopy_threshold: 50}").is_err());
    }
}
