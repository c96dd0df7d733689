//! Tracks the status of mass update cycles that run in the background.
//!
//! An upload request starts a cycle and immediately returns a job id. The
//! cycle reports each stage it enters, then its final outcome, as
//! [`JobUpdate`] messages on an MPSC channel. [`start_job_updater`] drains the
//! channel into the shared [`JobsState`] map, which the status endpoint reads.
//! Sending every update through the one channel keeps them in order, so a
//! late stage update can never overwrite a final status.

use common::jobs::JobStatus;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

/// A thread-safe, shareable container for the state of all background jobs.
#[derive(Clone)]
pub struct JobsState {
    /// Job id to its latest status. Entries are never evicted: finished jobs
    /// stay queryable for the life of the process, and only one cycle runs at
    /// a time, so the map grows by one small entry per upload.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Sender used by running cycles to publish their progress.
    pub tx: mpsc::Sender<JobUpdate>,
}

impl JobsState {
    /// Creates an empty state and the receiver to pass to [`start_job_updater`].
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    /// Registers a new job as `Pending` and returns its id.
    pub async fn register(&self) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.jobs
            .write()
            .await
            .insert(job_id.clone(), JobStatus::Pending);
        job_id
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

/// A status change for one job.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
        }
    }
}

/// Applies every received update to the shared map until all senders are gone.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id.clone(), update.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::mass_update::PipelineStage;

    #[actix_web::test]
    async fn updates_are_applied_in_order() {
        let (state, rx) = JobsState::new(8);
        let job_id = state.register().await;
        assert!(matches!(state.status(&job_id).await, Some(JobStatus::Pending)));

        for stage in [PipelineStage::Parsing, PipelineStage::Validating] {
            state
                .tx
                .send(JobUpdate::new(&job_id, JobStatus::InProgress(stage)))
                .await
                .unwrap();
        }
        let handle = actix_web::rt::spawn(start_job_updater(state.clone(), rx));

        let mut latest = None;
        for _ in 0..100 {
            latest = state.status(&job_id).await;
            if matches!(latest, Some(JobStatus::InProgress(PipelineStage::Validating))) {
                break;
            }
            actix_web::rt::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        handle.abort();

        assert!(matches!(
            latest,
            Some(JobStatus::InProgress(PipelineStage::Validating))
        ));
        assert!(state.status("unknown").await.is_none());
    }
}
