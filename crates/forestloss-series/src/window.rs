//! Loss over a three-generation window.
//!
//! The window is three generation lengths, looking back at least ten years
//! from the most recent observation. A window longer than the observed data
//! is extrapolated from a linear fit of remaining cover against year; a
//! window inside the data is read off the series by linear interpolation.

use forestloss_common::SpeciesKey;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::{CoverSeries, Result, SeriesError};

/// Minimum lookback, in years, from the latest observation.
pub const MIN_LOOKBACK_YEARS: f64 = 10.0;

/// How the window's loss was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMethod {
    /// Window longer than the observed data; end value predicted by regression.
    Extrapolated,
    /// Window inside the observed data; start value interpolated.
    Interpolated,
}

/// Loss over the three-generation window of one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationResult {
    /// Window start year, possibly fractional.
    pub start: f64,
    /// Window finish year.
    pub finish: f64,
    /// Area lost over the window, in km².
    pub loss: f64,
    /// Loss as a percentage of the cover at the window start.
    pub percent_loss: f64,
    /// Which branch produced the result.
    pub method: WindowMethod,
}

/// Least-squares line through `points`, as `(slope, intercept)`.
fn linear_fit(points: &[(f64, f64)]) -> (f64, f64) {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();

    let slope = xs.iter().covariance(ys.iter()) / xs.iter().variance();
    let intercept = ys.iter().mean() - slope * xs.iter().mean();
    (slope, intercept)
}

/// Compute the three-generation loss of a series.
///
/// `key` identifies the species in errors.
pub fn three_generation_loss(
    series: &CoverSeries,
    generation_length: f64,
    key: SpeciesKey,
) -> Result<ExtrapolationResult> {
    let years = series.years();
    let year0 = years.first_year();
    let end = years.final_year + 1;
    let window = 3.0 * generation_length;
    let domain = |reason: String| SeriesError::ArithmeticDomain { key, reason };

    let (start, finish, start_remaining, loss, method) = if window > years.data_span() as f64 {
        let points: Vec<(f64, f64)> = series.points().map(|(y, r)| (y as f64, r)).collect();
        let (slope, intercept) = linear_fit(&points);
        let finish = year0 as f64 + window;
        let predicted = slope * finish + intercept;

        // Never above the latest observation, never negative.
        let clamped = predicted.min(series.latest()).max(0.0);
        let baseline = series.baseline();
        (year0 as f64, finish, baseline, baseline - clamped, WindowMethod::Extrapolated)
    } else {
        let window_start = (end as f64 - window).min(end as f64 - MIN_LOOKBACK_YEARS);
        let lower = window_start.floor() as i32;
        let upper = window_start.ceil() as i32;
        let offset = window_start - lower as f64;

        let (Some(low), Some(high)) = (series.remaining(lower), series.remaining(upper)) else {
            return Err(domain(format!(
                "window start {window_start} is before the first observed year {year0}"
            )));
        };
        let interpolated = low + (high - low) * offset;
        (
            window_start,
            end as f64,
            interpolated,
            interpolated - series.latest(),
            WindowMethod::Interpolated,
        )
    };

    if start_remaining == 0.0 {
        return Err(domain(format!("remaining cover at window start {start} is zero")));
    }

    Ok(ExtrapolationResult {
        start,
        finish,
        loss,
        percent_loss: 100.0 * loss / start_remaining,
        method,
    })
}
