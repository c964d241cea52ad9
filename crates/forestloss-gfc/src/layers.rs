//! Forest-change layers derived from canopy cover and loss year.

use forestloss_common::{GfcYears, LayerLabel};
use serde::{Deserialize, Serialize};

/// Analysis parameters applied to every species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Minimum canopy-cover fraction counted as forest; lower pixels count as zero.
    pub canopy_threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            canopy_threshold: 0.5,
        }
    }
}

impl AnalysisOptions {
    /// Canopy fraction that counts as forest, from a `treecover` percentage.
    pub fn forest_fraction(&self, treecover_percent: f64) -> f64 {
        let fraction = treecover_percent / 100.0;
        if fraction >= self.canopy_threshold {
            fraction
        } else {
            0.0
        }
    }
}

/// Resolution reduction and pixel budget for the area reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionOptions {
    /// Target reduction scale in metres.
    pub scale_m: f64,
    /// Maximum number of pixels a single reduction may visit.
    pub max_pixels: f64,
    /// Explicit block-mean factor, overriding the one derived from `scale_m`.
    pub factor: Option<u32>,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            scale_m: 600.0,
            max_pixels: 1e13,
            factor: None,
        }
    }
}

/// Metres per degree of latitude on the mean sphere.
const METRES_PER_DEGREE: f64 = 111_194.93;

impl ReductionOptions {
    /// Block-mean factor for a native pixel height in degrees.
    ///
    /// Native pixels coarser than the target scale are not reduced.
    pub fn block_factor(&self, pixel_height_deg: f64) -> u32 {
        if let Some(factor) = self.factor {
            return factor.max(1);
        }
        let native_m = pixel_height_deg * METRES_PER_DEGREE;
        ((self.scale_m / native_m).floor() as u32).max(1)
    }
}

/// What a forest-change layer selects from the source layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerKind {
    /// Thresholded canopy cover at the baseline year.
    Baseline,
    /// Baseline cover restricted to pixels whose loss-year band equals `band_value`.
    LossYear {
        /// Loss-year band value (`year - epoch`).
        band_value: i32,
    },
}

/// One labelled layer of the area expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestChangeLayer {
    /// Label the computed area is reported under.
    pub label: LayerLabel,
    /// Selection applied to the baseline cover.
    pub kind: LayerKind,
}

impl ForestChangeLayer {
    /// Whether a pixel with this loss-year band value contributes to the layer.
    ///
    /// `lossyear` is `None` where the loss-year layer has no data.
    pub fn selects(&self, lossyear: Option<i32>) -> bool {
        match self.kind {
            LayerKind::Baseline => true,
            LayerKind::LossYear { band_value } => lossyear == Some(band_value),
        }
    }
}

/// The baseline layer followed by one loss layer per covered year.
pub fn compose_layers(years: &GfcYears) -> Vec<ForestChangeLayer> {
    std::iter::once(ForestChangeLayer {
        label: years.baseline_label(),
        kind: LayerKind::Baseline,
    })
    .chain(years.loss_years().map(|year| ForestChangeLayer {
        label: LayerLabel::Loss(year),
        kind: LayerKind::LossYear {
            band_value: years.loss_band_value(year),
        },
    }))
    .collect()
}
