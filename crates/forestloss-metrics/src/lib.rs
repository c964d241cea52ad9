//! Metrics for the forest-loss pipeline.
//!
//! Every metric the pipeline records is declared once here as a [`Metric`]
//! constant, so call sites cannot drift from the registered descriptions.
//! The `metrics` facade is re-exported; nothing is recorded unless the
//! binary installs a recorder (see `install_prometheus` behind the
//! `prometheus` feature).
//!
//! # Example
//!
//! ```rust,ignore
//! use forestloss_metrics::{describe_metrics, metric_defs, StageLabels};
//!
//! describe_metrics();
//!
//! let labels = StageLabels::new("rasterize", "run-20240101-abcd").to_labels();
//! metrics::counter!(metric_defs::CHUNKS_PROCESSED.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use forestloss_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const UPLOADS: Metric = Metric::counter("forestloss.test.uploads")
///     .with_description("Masks uploaded")
///     .with_unit(Unit::Count)
///     .with_labels(&["stage"]);
///
/// assert_eq!(UPLOADS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "forestloss.range.chunks").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every pipeline metric.
    pub const STAGE_LABELS: &[&str] = &["stage", "run_id"];

    // ========================================================================
    // Rasterization
    // ========================================================================

    /// Chunks of the vector source processed.
    pub const CHUNKS_PROCESSED: Metric = Metric::counter("forestloss.range.chunks_processed")
        .with_description("Chunks of the vector source processed")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Vector rows read and retained by a chunk.
    pub const ROWS_READ: Metric = Metric::counter("forestloss.range.rows_read")
        .with_description("Vector rows read and retained by chunks")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Composite ranges rasterized and uploaded.
    ///
    /// Labels: stage, run_id, breeding
    pub const COMPOSITES_RASTERIZED: Metric =
        Metric::counter("forestloss.range.composites_rasterized")
            .with_description("Composite ranges rasterized and uploaded")
            .with_unit(Unit::Count)
            .with_labels(&["stage", "run_id", "breeding"]);

    /// Bytes of packed masks written to the raster store.
    pub const BYTES_UPLOADED: Metric = Metric::counter("forestloss.range.bytes_uploaded")
        .with_description("Bytes of packed masks written to the raster store")
        .with_unit(Unit::Bytes)
        .with_labels(STAGE_LABELS);

    // ========================================================================
    // Remote jobs
    // ========================================================================

    /// Area and export jobs submitted to the compute backend.
    pub const JOBS_SUBMITTED: Metric = Metric::counter("forestloss.gfc.jobs_submitted")
        .with_description("Jobs submitted to the compute backend")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Jobs that reached the Failed state.
    pub const JOBS_FAILED: Metric = Metric::counter("forestloss.gfc.jobs_failed")
        .with_description("Jobs that reached the Failed state")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Jobs not yet terminal at the latest poll.
    pub const JOBS_PENDING: Metric = Metric::gauge("forestloss.gfc.jobs_pending")
        .with_description("Jobs not yet in a terminal state")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    // ========================================================================
    // Post-processing
    // ========================================================================

    /// Rows appended to the combined output table.
    pub const ROWS_WRITTEN: Metric = Metric::counter("forestloss.series.rows_written")
        .with_description("Rows appended to the combined output table")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Species skipped because reconstruction failed.
    ///
    /// Labels: stage, run_id, reason
    pub const SPECIES_SKIPPED: Metric = Metric::counter("forestloss.series.species_skipped")
        .with_description("Species skipped because reconstruction failed")
        .with_unit(Unit::Count)
        .with_labels(&["stage", "run_id", "reason"]);

    /// Three-generation percentage loss per species.
    pub const PERCENT_LOSS: Metric = Metric::histogram("forestloss.series.percent_loss")
        .with_description("Three-generation percentage loss per species")
        .with_unit(Unit::Percent)
        .with_labels(STAGE_LABELS);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &CHUNKS_PROCESSED,
        &ROWS_READ,
        &COMPOSITES_RASTERIZED,
        &BYTES_UPLOADED,
        &JOBS_SUBMITTED,
        &JOBS_FAILED,
        &JOBS_PENDING,
        &ROWS_WRITTEN,
        &SPECIES_SKIPPED,
        &PERCENT_LOSS,
    ];
}

/// Labels identifying which stage of which run recorded a metric.
#[derive(Debug, Clone)]
pub struct StageLabels {
    /// Pipeline stage (`rasterize`, `analyse`, `postprocess`).
    pub stage: &'static str,
    /// Run identifier from the pipeline context.
    pub run_id: String,
}

impl StageLabels {
    /// Labels for `stage` of run `run_id`.
    pub fn new(stage: &'static str, run_id: impl Into<String>) -> Self {
        Self {
            stage,
            run_id: run_id.into(),
        }
    }

    /// Labels in the `metrics` crate format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("stage", self.stage.to_string()), ("run_id", self.run_id.clone())]
    }

    /// Labels with additional key-value pairs appended.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Registers descriptions for every pipeline metric.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving scrapes on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        let labels = StageLabels::new("rasterize", "run-1");
        let label_vec = labels.to_labels();

        assert_eq!(label_vec.len(), 2);
        assert!(label_vec.contains(&("stage", "rasterize".to_string())));
        assert!(label_vec.contains(&("run_id", "run-1".to_string())));
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = StageLabels::new("postprocess", "run-1");
        let extended = labels.with(&[("reason", "missing_generation_length".to_string())]);

        assert_eq!(extended.len(), 3);
        assert!(extended.contains(&("reason", "missing_generation_length".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(
            metric_defs::CHUNKS_PROCESSED.name,
            "forestloss.range.chunks_processed"
        );
        assert_eq!(metric_defs::CHUNKS_PROCESSED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::BYTES_UPLOADED.unit, Some(Unit::Bytes));
        assert_eq!(metric_defs::JOBS_PENDING.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::PERCENT_LOSS.kind, MetricKind::Histogram);
        assert_eq!(
            metric_defs::SPECIES_SKIPPED.labels,
            &["stage", "run_id", "reason"]
        );
    }

    #[test]
    fn test_all_metrics_have_unique_names() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert!(metric_defs::ALL.iter().all(|m| !m.description.is_empty()));
    }

    #[test]
    fn test_describe_without_recorder() {
        // Describing with no recorder installed is a no-op.
        describe_metrics();
    }
}
