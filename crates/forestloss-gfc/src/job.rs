//! Remote jobs, their states and the compute-backend seam.

use std::fmt;

use forestloss_common::RasterAsset;
use serde::{Deserialize, Serialize};

use crate::{AltitudeBand, AnalysisOptions, ForestChangeLayer, ReductionOptions, Result};

/// Backend-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a remote job: `Pending → Running → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, not started.
    Pending,
    /// Executing.
    Running,
    /// Finished and exported its result record.
    Completed,
    /// Finished without a result.
    Failed,
}

impl JobState {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// State of one job as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Job identifier.
    pub id: JobId,
    /// Current state.
    pub state: JobState,
    /// Failure message, for Failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a backend needs to compute and export one composite range's areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaJobSpec {
    /// Range mask to reduce over.
    pub asset: RasterAsset,
    /// Elevation band of the species.
    pub altitude: AltitudeBand,
    /// Layers whose areas are computed, each under its label.
    pub layers: Vec<ForestChangeLayer>,
    /// Canopy threshold.
    pub analysis: AnalysisOptions,
    /// Resolution reduction and pixel budget.
    pub reduction: ReductionOptions,
    /// Object path the result record is exported to.
    pub export_path: String,
}

/// A submitted area job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    /// Backend identifier.
    pub id: JobId,
    /// Range mask the job reduces over.
    pub asset: RasterAsset,
    /// Where the job exports its result record.
    pub export_path: String,
}

/// A remote compute service that runs area jobs.
///
/// Jobs may run concurrently on the backend; the caller only observes them
/// through these blocking calls.
pub trait ComputeBackend: Send + Sync {
    /// Submit a job, returning its identifier. The job starts Pending.
    fn submit(&self, spec: &AreaJobSpec) -> Result<JobId>;

    /// Current status of a job.
    fn status(&self, id: &JobId) -> Result<JobStatus>;

    /// Every job not yet in a terminal state, oldest submission first.
    fn list_active(&self) -> Result<Vec<JobStatus>>;

    /// Block until the job reaches a terminal state.
    fn wait(&self, id: &JobId) -> Result<JobStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_state_wire_names() {
        let status: JobStatus =
            serde_json::from_str(r#"{"id": "job-7", "state": "RUNNING"}"#).unwrap();
        assert_eq!(status.id, JobId("job-7".to_string()));
        assert_eq!(status.state, JobState::Running);
        assert_eq!(status.error, None);
        assert_eq!(serde_json::to_string(&JobState::Failed).unwrap(), "\"FAILED\"");
    }
}
