//! In-process compute backend.
//!
//! [`LocalBackend`] runs area jobs against GeoTIFF layers held in memory. A job
//! is queued by [`submit`](ComputeBackend::submit) and executed by the first
//! thread that waits on it; other threads waiting on the same job block until
//! it reaches a terminal state. A job whose execution panics is marked failed
//! before the panic leaves [`wait`](ComputeBackend::wait).

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use forestloss_common::AreaResultRecord;
use forestloss_raster::RasterStore;
use tracing::{debug, info, warn};

use crate::area::{compute_areas, GfcLayers};
use crate::{encode_export, AreaJobSpec, ComputeBackend, GfcError, JobId, JobState, JobStatus, ObjectStore, Result};

struct LocalJob {
    id: JobId,
    spec: AreaJobSpec,
    state: JobState,
    error: Option<String>,
}

impl LocalJob {
    fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id.clone(),
            state: self.state,
            error: self.error.clone(),
        }
    }
}

/// Jobs in submission order.
#[derive(Default)]
struct JobTable {
    jobs: Vec<LocalJob>,
}

impl JobTable {
    fn position(&self, id: &JobId) -> Result<usize> {
        self.jobs
            .iter()
            .position(|job| &job.id == id)
            .ok_or_else(|| GfcError::UnknownJob(id.to_string()))
    }
}

/// A job claimed by one waiter. Dropping it unsettled marks the job failed.
struct Claim<'a> {
    backend: &'a LocalBackend,
    id: &'a JobId,
    settled: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut table = match self.backend.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Ok(index) = table.position(self.id) {
            let job = &mut table.jobs[index];
            job.state = JobState::Failed;
            job.error = Some("area job panicked".to_string());
        }
        drop(table);
        self.backend.finished.notify_all();
    }
}

/// A [`ComputeBackend`] that computes areas in the calling process.
pub struct LocalBackend {
    layers: GfcLayers,
    rasters: Arc<dyn RasterStore>,
    objects: Arc<dyn ObjectStore>,
    table: Mutex<JobTable>,
    finished: Condvar,
}

impl LocalBackend {
    /// Create a backend reading masks from `rasters` and exporting to `objects`.
    pub fn new(layers: GfcLayers, rasters: Arc<dyn RasterStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            layers,
            rasters,
            objects,
            table: Mutex::new(JobTable::default()),
            finished: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, JobTable>> {
        self.table.lock().map_err(|_| GfcError::LockPoisoned)
    }

    /// Compute the areas of one job and export the result record.
    fn execute(&self, spec: &AreaJobSpec) -> Result<()> {
        let mask = self.rasters.get_mask(&spec.asset.asset_id)?;
        let areas = compute_areas(&mask, &self.layers, spec)?;

        let record = AreaResultRecord {
            sisid: spec.asset.key.sisid,
            sci_name: spec.asset.sci_name.clone(),
            breeding: spec.asset.key.breeding,
            areas,
        };
        let bytes = encode_export(&record)?;
        self.objects.put(&spec.export_path, &bytes)?;
        debug!(path = %spec.export_path, bytes = bytes.len(), "exported result record");
        Ok(())
    }
}

impl ComputeBackend for LocalBackend {
    fn submit(&self, spec: &AreaJobSpec) -> Result<JobId> {
        let mut table = self.lock()?;
        let id = JobId(format!("local-{:06}", table.jobs.len() + 1));
        table.jobs.push(LocalJob {
            id: id.clone(),
            spec: spec.clone(),
            state: JobState::Pending,
            error: None,
        });
        debug!(job = %id, asset = %spec.asset.asset_id, "queued area job");
        Ok(id)
    }

    fn status(&self, id: &JobId) -> Result<JobStatus> {
        let table = self.lock()?;
        let index = table.position(id)?;
        Ok(table.jobs[index].status())
    }

    fn list_active(&self) -> Result<Vec<JobStatus>> {
        let table = self.lock()?;
        Ok(table
            .jobs
            .iter()
            .filter(|job| !job.state.is_terminal())
            .map(LocalJob::status)
            .collect())
    }

    fn wait(&self, id: &JobId) -> Result<JobStatus> {
        let spec = {
            let mut table = self.lock()?;
            let index = table.position(id)?;
            loop {
                let state = table.jobs[index].state;
                match state {
                    JobState::Pending => break,
                    JobState::Running => {
                        table = self.finished.wait(table).map_err(|_| GfcError::LockPoisoned)?;
                    }
                    JobState::Completed | JobState::Failed => return Ok(table.jobs[index].status()),
                }
            }
            let job = &mut table.jobs[index];
            job.state = JobState::Running;
            job.spec.clone()
        };

        let mut claim = Claim {
            backend: self,
            id,
            settled: false,
        };
        info!(job = %id, species = %spec.asset.key, "running area job");
        let outcome = self.execute(&spec);

        let status = {
            let mut table = self.lock()?;
            let index = table.position(id)?;
            let job = &mut table.jobs[index];
            match outcome {
                Ok(()) => job.state = JobState::Completed,
                Err(e) => {
                    warn!(job = %id, species = %spec.asset.key, error = %e, "area job failed");
                    job.state = JobState::Failed;
                    job.error = Some(e.to_string());
                }
            }
            job.status()
        };
        claim.settled = true;
        self.finished.notify_all();
        Ok(status)
    }
}
