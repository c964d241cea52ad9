//! Submitting one area job per range mask and waiting for all of them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use forestloss_common::{GfcYears, RasterAsset};
use forestloss_metrics::{metric_defs, StageLabels};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    compose_layers, export_path, AltitudeTable, AnalysisOptions, AreaJobSpec, ComputeBackend, GfcError,
    JobState, ReductionOptions, RemoteJob, Result,
};

/// A job that finished without producing a result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJobFailure {
    /// The failed job.
    pub job: RemoteJob,
    /// Failure message reported by the backend.
    pub message: String,
}

impl fmt::Display for RemoteJobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} for {} ({}) failed: {}",
            self.job.id, self.job.asset.key, self.job.asset.sci_name, self.message
        )
    }
}

/// Final state of one awaited job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// The job.
    pub job: RemoteJob,
    /// Terminal state.
    pub state: JobState,
    /// Failure message, for Failed jobs.
    pub error: Option<String>,
}

/// Result of [`RemoteJobOrchestrator::await_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitSummary {
    /// One outcome per awaited job, in submission order.
    pub outcomes: Vec<JobOutcome>,
}

impl AwaitSummary {
    /// Jobs that completed and exported a record.
    pub fn completed(&self) -> impl Iterator<Item = &RemoteJob> {
        self.outcomes
            .iter()
            .filter(|o| o.state == JobState::Completed)
            .map(|o| &o.job)
    }

    /// Jobs that failed.
    pub fn failures(&self) -> Vec<RemoteJobFailure> {
        self.outcomes
            .iter()
            .filter(|o| o.state == JobState::Failed)
            .map(|o| RemoteJobFailure {
                job: o.job.clone(),
                message: o.error.clone().unwrap_or_else(|| "no error message".to_string()),
            })
            .collect()
    }
}

/// Builds area jobs for uploaded range masks and drives them to completion.
pub struct RemoteJobOrchestrator {
    backend: Arc<dyn ComputeBackend>,
    years: GfcYears,
    analysis: AnalysisOptions,
    reduction: ReductionOptions,
    labels: StageLabels,
}

impl RemoteJobOrchestrator {
    /// Create an orchestrator submitting to `backend`.
    pub fn new(
        backend: Arc<dyn ComputeBackend>,
        years: GfcYears,
        analysis: AnalysisOptions,
        reduction: ReductionOptions,
    ) -> Self {
        Self {
            backend,
            years,
            analysis,
            reduction,
            labels: StageLabels::new("analyse", ""),
        }
    }

    /// Tag metrics with the given run identifier.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.labels = StageLabels::new("analyse", run_id);
        self
    }

    /// Submit one area job per asset.
    ///
    /// Each job reduces the forest-change layers over the asset's mask within
    /// the species' altitude band and exports its record to
    /// `<export_prefix>/<sisid>_<breeding>.csv`.
    pub fn submit_area_jobs(
        &self,
        assets: &[RasterAsset],
        altitude: &AltitudeTable,
        export_prefix: &str,
    ) -> Result<Vec<RemoteJob>> {
        let mut seen = HashSet::new();
        if let Some(dup) = assets.iter().find(|a| !seen.insert(a.key)) {
            return Err(GfcError::InputFormat(format!("asset list names {} twice", dup.key)));
        }

        let layers = compose_layers(&self.years);
        let labels = self.labels.to_labels();
        let mut jobs = Vec::with_capacity(assets.len());

        for asset in assets {
            let spec = AreaJobSpec {
                asset: asset.clone(),
                altitude: altitude.band(&asset.sci_name),
                layers: layers.clone(),
                analysis: self.analysis,
                reduction: self.reduction,
                export_path: export_path(export_prefix, asset.key),
            };
            let id = self.backend.submit(&spec)?;
            metrics::counter!(metric_defs::JOBS_SUBMITTED.name, &labels).increment(1);
            info!(
                job = %id,
                key = %asset.key,
                sci_name = %asset.sci_name,
                min_altitude = spec.altitude.min,
                max_altitude = spec.altitude.max,
                "submitted area job"
            );
            jobs.push(RemoteJob {
                id,
                asset: asset.clone(),
                export_path: spec.export_path,
            });
        }
        Ok(jobs)
    }

    /// Block until the backend has no active jobs, then report every job's final state.
    ///
    /// The oldest active job is waited on first. A Failed job does not stop
    /// the wait; it is reported in the summary.
    pub fn await_all(&self, jobs: &[RemoteJob]) -> Result<AwaitSummary> {
        let labels = self.labels.to_labels();
        loop {
            let active = self.backend.list_active()?;
            metrics::gauge!(metric_defs::JOBS_PENDING.name, &labels).set(active.len() as f64);
            let Some(oldest) = active.first() else {
                break;
            };
            info!(job = %oldest.id, state = %oldest.state, active = active.len(), "waiting on job");
            self.backend.wait(&oldest.id)?;
        }

        let mut summary = AwaitSummary::default();
        for job in jobs {
            let status = self.backend.status(&job.id)?;
            if status.state == JobState::Failed {
                metrics::counter!(metric_defs::JOBS_FAILED.name, &labels).increment(1);
                warn!(
                    job = %job.id,
                    key = %job.asset.key,
                    error = status.error.as_deref().unwrap_or(""),
                    "area job failed"
                );
            }
            summary.outcomes.push(JobOutcome {
                job: job.clone(),
                state: status.state,
                error: status.error,
            });
        }

        info!(
            jobs = summary.outcomes.len(),
            failed = summary.failures().len(),
            "all area jobs finished"
        );
        Ok(summary)
    }
}
