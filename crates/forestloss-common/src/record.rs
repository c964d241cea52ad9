//! Per-species area results and their validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Breeding, CommonError, GfcYears, LayerLabel, Result, SisId, SpeciesKey};

/// Areas computed for one composite range, keyed by layer label.
///
/// This is the loosely-checked form read back from persistent storage. Call
/// [`AreaResultRecord::validate`] before handing it to the reconstructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaResultRecord {
    /// Species identifier.
    pub sisid: SisId,
    /// Scientific name of the species.
    pub sci_name: String,
    /// Seasonal subset the range was dissolved from.
    pub breeding: Breeding,
    /// Area (km²) per layer label.
    pub areas: BTreeMap<LayerLabel, f64>,
}

impl AreaResultRecord {
    /// Key of the composite range the record describes.
    pub fn key(&self) -> SpeciesKey {
        SpeciesKey::new(self.sisid, self.breeding)
    }

    /// Check that the record carries a finite area for every expected label.
    ///
    /// Labels outside the expected set are kept but ignored downstream.
    pub fn validate(self, years: &GfcYears) -> Result<ValidatedRecord> {
        for label in years.expected_labels() {
            match self.areas.get(&label) {
                None => {
                    return Err(CommonError::MissingLayer {
                        sisid: self.sisid,
                        breeding: self.breeding,
                        label,
                    })
                }
                Some(area) if !area.is_finite() => {
                    return Err(CommonError::NonFiniteArea {
                        sisid: self.sisid,
                        breeding: self.breeding,
                        label,
                    })
                }
                Some(_) => {}
            }
        }

        Ok(ValidatedRecord {
            record: self,
            years: *years,
        })
    }
}

/// An [`AreaResultRecord`] known to hold every area the reconstructor reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    record: AreaResultRecord,
    years: GfcYears,
}

impl ValidatedRecord {
    /// Years the record was validated against.
    pub fn years(&self) -> &GfcYears {
        &self.years
    }

    /// The underlying record.
    pub fn record(&self) -> &AreaResultRecord {
        &self.record
    }

    /// Key of the composite range.
    pub fn key(&self) -> SpeciesKey {
        self.record.key()
    }

    /// Scientific name.
    pub fn sci_name(&self) -> &str {
        &self.record.sci_name
    }

    /// Baseline remaining area at year0.
    pub fn baseline(&self) -> f64 {
        self.area(self.years.baseline_label())
    }

    /// Loss area in `year`, or zero for a year outside the covered range.
    pub fn loss(&self, year: i32) -> f64 {
        if self.years.loss_years().contains(&year) {
            self.area(LayerLabel::Loss(year))
        } else {
            0.0
        }
    }

    fn area(&self, label: LayerLabel) -> f64 {
        self.record.areas.get(&label).copied().unwrap_or_default()
    }
}
