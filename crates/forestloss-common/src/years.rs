//! Years covered by the forest-change dataset and the layer labels derived from them.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CommonError, Result};

/// Baseline year of the Hansen global forest-change dataset (`treecover2000`).
pub const HANSEN_EPOCH: i32 = 2000;

/// Years covered by a forest-change dataset.
///
/// The baseline canopy layer describes cover at the end of `epoch`, so the
/// remaining series starts at `epoch + 1` (called year0 throughout the crates).
/// The loss-year band encodes loss in year `Y` as the value `Y - epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GfcYears {
    /// Baseline year of the canopy layer.
    pub epoch: i32,
    /// Final year with a loss band value.
    pub final_year: i32,
}

impl GfcYears {
    /// Create a year range, rejecting a final year that does not follow the epoch.
    pub fn new(epoch: i32, final_year: i32) -> Result<Self> {
        if final_year <= epoch {
            return Err(CommonError::InvalidYears { epoch, final_year });
        }
        Ok(Self { epoch, final_year })
    }

    /// Hansen GFC years with the given final covered year.
    pub fn hansen(final_year: i32) -> Result<Self> {
        Self::new(HANSEN_EPOCH, final_year)
    }

    /// First year of the remaining series (year0), which carries the baseline.
    pub fn first_year(&self) -> i32 {
        self.epoch + 1
    }

    /// Number of observed loss years.
    pub fn data_span(&self) -> i32 {
        self.final_year - self.epoch
    }

    /// Years with a loss layer, `year0..=final_year`.
    pub fn loss_years(&self) -> RangeInclusive<i32> {
        self.first_year()..=self.final_year
    }

    /// Years of the reconstructed remaining series, `year0..=final_year + 1`.
    pub fn remaining_years(&self) -> RangeInclusive<i32> {
        self.first_year()..=self.final_year + 1
    }

    /// Value of the loss-year band for loss in `year`.
    pub fn loss_band_value(&self, year: i32) -> i32 {
        year - self.epoch
    }

    /// Label of the baseline layer.
    pub fn baseline_label(&self) -> LayerLabel {
        LayerLabel::Remaining(self.first_year())
    }

    /// Every label a complete result record must carry: the baseline followed
    /// by one loss label per covered year.
    pub fn expected_labels(&self) -> Vec<LayerLabel> {
        std::iter::once(self.baseline_label())
            .chain(self.loss_years().map(LayerLabel::Loss))
            .collect()
    }
}

/// Label attached to a forest-change layer and to the area reported for it.
///
/// The textual form (`2001_remaining`, `2014_loss`) is the column name used in
/// export records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum LayerLabel {
    /// Cover remaining at the start of the given year.
    Remaining(i32),
    /// Cover lost during the given year.
    Loss(i32),
}

impl LayerLabel {
    /// Year the label refers to.
    pub fn year(&self) -> i32 {
        match self {
            LayerLabel::Remaining(year) | LayerLabel::Loss(year) => *year,
        }
    }
}

impl fmt::Display for LayerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerLabel::Remaining(year) => write!(f, "{year}_remaining"),
            LayerLabel::Loss(year) => write!(f, "{year}_loss"),
        }
    }
}

impl FromStr for LayerLabel {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CommonError::InvalidLayerLabel(s.to_string());
        let (year, kind) = s.trim().split_once('_').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        match kind {
            "remaining" => Ok(LayerLabel::Remaining(year)),
            "loss" => Ok(LayerLabel::Loss(year)),
            _ => Err(invalid()),
        }
    }
}

impl From<LayerLabel> for String {
    fn from(value: LayerLabel) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for LayerLabel {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
