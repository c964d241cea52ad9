//! Yearly remaining-cover series.

use forestloss_common::{GfcYears, ValidatedRecord};

/// Remaining forest cover for every year of a record, with the losses it was built from.
///
/// `remaining[year0]` is the baseline and each following year subtracts the
/// previous year's loss. Values are not clamped, so a record whose losses
/// exceed its baseline yields negative remaining cover.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverSeries {
    years: GfcYears,
    remaining: Vec<f64>,
    losses: Vec<f64>,
}

impl CoverSeries {
    /// Rebuild the series from a validated record.
    pub fn from_record(record: &ValidatedRecord) -> Self {
        let years = *record.years();
        let losses: Vec<f64> = years.loss_years().map(|year| record.loss(year)).collect();

        let mut remaining = Vec::with_capacity(losses.len() + 1);
        remaining.push(record.baseline());
        for loss in &losses {
            let previous = remaining[remaining.len() - 1];
            remaining.push(previous - loss);
        }

        Self {
            years,
            remaining,
            losses,
        }
    }

    /// Years the series covers.
    pub fn years(&self) -> &GfcYears {
        &self.years
    }

    /// Remaining cover at the start of `year`, for `year0..=final_year + 1`.
    pub fn remaining(&self, year: i32) -> Option<f64> {
        let index = usize::try_from(year - self.years.first_year()).ok()?;
        self.remaining.get(index).copied()
    }

    /// Loss during `year`, for `year0..=final_year`.
    pub fn loss(&self, year: i32) -> Option<f64> {
        let index = usize::try_from(year - self.years.first_year()).ok()?;
        self.losses.get(index).copied()
    }

    /// Baseline cover at year0.
    pub fn baseline(&self) -> f64 {
        self.remaining[0]
    }

    /// Most recently observed remaining cover, at `final_year + 1`.
    pub fn latest(&self) -> f64 {
        self.remaining[self.remaining.len() - 1]
    }

    /// `(year, remaining)` pairs in year order.
    pub fn points(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.years.remaining_years().zip(self.remaining.iter().copied())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use forestloss_common::{AreaResultRecord, Breeding, LayerLabel, SisId};

    pub(crate) fn validated(years: GfcYears, baseline: f64, losses: &[f64]) -> ValidatedRecord {
        let mut areas = BTreeMap::new();
        areas.insert(years.baseline_label(), baseline);
        for (year, loss) in years.loss_years().zip(losses) {
            areas.insert(LayerLabel::Loss(year), *loss);
        }
        AreaResultRecord {
            sisid: SisId(1),
            sci_name: "Harpia harpyja".to_string(),
            breeding: Breeding::Breeding,
            areas,
        }
        .validate(&years)
        .unwrap()
    }

    #[test]
    fn test_series_subtracts_losses() {
        let years = GfcYears::hansen(2003).unwrap();
        let series = CoverSeries::from_record(&validated(years, 100.0, &[10.0, 5.0, 20.0]));

        let points: Vec<(i32, f64)> = series.points().collect();
        assert_eq!(
            points,
            vec![(2001, 100.0), (2002, 90.0), (2003, 85.0), (2004, 65.0)]
        );
        assert_eq!(series.latest(), 65.0);
        assert_eq!(series.loss(2002), Some(5.0));
        assert_eq!(series.loss(2004), None);
        assert_eq!(series.remaining(2000), None);
    }

    #[test]
    fn test_losses_recovered_from_remaining() {
        let years = GfcYears::hansen(2010).unwrap();
        let losses = [3.0, 0.0, 12.5, 7.25, 1.0, 0.5, 100.0, 2.0, 9.75, 4.0];
        let series = CoverSeries::from_record(&validated(years, 512.0, &losses));

        for (year, loss) in years.loss_years().zip(losses) {
            let derived = series.remaining(year).unwrap() - series.remaining(year + 1).unwrap();
            assert_eq!(derived, loss, "loss in {year}");
        }
    }

    #[test]
    fn test_negative_remaining_is_kept() {
        let years = GfcYears::hansen(2002).unwrap();
        let series = CoverSeries::from_record(&validated(years, 10.0, &[8.0, 5.0]));
        assert_eq!(series.latest(), -3.0);
    }
}
