// In-memory job registry
//
// Owns the job state machine: CREATED -> RUNNING -> SUCCEEDED | FAILED.
// Terminal records are immutable and progress only advances while RUNNING.
// The registry is handed to whoever needs it instead of living in a
// module-level global, so each test (and each embedding) gets its own.
use crate::models::{Artifact, Job, JobStatus};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    /// All jobs, most recently created first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        self.jobs.write().remove(job_id)
    }

    /// Applies a mutation unless the job is unknown or already terminal.
    /// `updated_at` advances only when the closure reports a change.
    fn update<F>(&self, job_id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let mut jobs = self.jobs.write();
        let job = match jobs.get_mut(job_id) {
            Some(job) => job,
            None => return false,
        };
        if job.status.is_terminal() {
            return false;
        }
        if mutate(job) {
            job.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    pub fn mark_running(&self, job_id: &str) -> bool {
        self.update(job_id, |job| {
            if job.status == JobStatus::Created {
                job.status = JobStatus::Running;
                true
            } else {
                false
            }
        })
    }

    /// Advances progress; regressions and updates outside RUNNING are
    /// ignored rather than rejected so stage code never has to care.
    pub fn set_progress(&self, job_id: &str, percent: u8) -> bool {
        self.update(job_id, |job| {
            let percent = percent.min(100);
            if job.status == JobStatus::Running && percent > job.progress {
                job.progress = percent;
                true
            } else {
                false
            }
        })
    }

    pub fn complete(&self, job_id: &str, artifacts: Vec<Artifact>) -> bool {
        self.update(job_id, |job| {
            job.status = JobStatus::Succeeded;
            job.progress = 100;
            job.artifacts = artifacts;
            true
        })
    }

    /// Terminal failure: records the message once and whatever artifacts
    /// could still be enumerated.
    pub fn fail(&self, job_id: &str, error: String, artifacts: Vec<Artifact>) -> bool {
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            if job.error.is_none() {
                job.error = Some(error);
            }
            job.artifacts = artifacts;
            true
        })
    }
}
