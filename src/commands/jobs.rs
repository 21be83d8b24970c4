// Conversion job command handlers
use crate::models::{Artifact, Job, JobConfig};
use crate::pipeline::{run_job, PipelineContext};
use crate::process_manager::{PoseEstimator, VideoTranscoder};
use crate::registry::JobRegistry;
use crate::utils::{AssetSet, StorageLayout};
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// The job surface consumed by a presentation layer: submit a video,
/// poll status, fetch artifacts. One instance owns its registry and
/// storage layout, so embeddings (and tests) stay isolated.
pub struct JobService {
    ctx: Arc<PipelineContext>,
}

impl JobService {
    pub fn new(
        layout: StorageLayout,
        assets: AssetSet,
        estimator: Arc<dyn PoseEstimator>,
        transcoder: Arc<dyn VideoTranscoder>,
    ) -> Self {
        Self {
            ctx: Arc::new(PipelineContext {
                registry: Arc::new(JobRegistry::new()),
                layout,
                assets,
                estimator,
                transcoder,
            }),
        }
    }

    /// Registers a job for the uploaded video and immediately spawns its
    /// pipeline task. Returns the job id without waiting for any stage.
    /// Must be called from within a tokio runtime.
    pub fn create_job(&self, video: &Path, config: JobConfig) -> Result<String, String> {
        if !video.exists() {
            return Err(format!("Input file not found: {}", video.display()));
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        self.ctx.layout.create_job_dir(&job_id)?;
        self.ctx
            .registry
            .insert(Job::new(job_id.clone(), config));

        debug!("Submitted conversion job {} for {:?}", job_id, video);

        let ctx = self.ctx.clone();
        let spawned_id = job_id.clone();
        let upload = video.to_path_buf();
        tokio::spawn(async move {
            run_job(ctx, spawned_id, upload).await;
        });

        Ok(job_id)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.ctx.registry.get(job_id)
    }

    /// All jobs, most recently created first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.ctx.registry.list()
    }

    pub fn get_artifacts(&self, job_id: &str) -> Option<Vec<Artifact>> {
        self.ctx.registry.get(job_id).map(|job| job.artifacts)
    }

    /// Removes a job record and optionally its artifact directory.
    /// Individual file removal failures are logged and ignored.
    pub fn delete_job(&self, job_id: &str, delete_output: bool) -> Result<(), String> {
        let removed = self
            .ctx
            .registry
            .remove(job_id)
            .ok_or_else(|| format!("Job not found: {}", job_id))?;

        if delete_output {
            let dir = self.ctx.layout.job_dir(job_id);
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    debug!("Warning: failed to delete job dir {:?}: {}", dir, e);
                }
            }
        }

        debug!("Deleted job: {}", removed.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use crate::pipeline::fixtures::{upright_detections, write_template_assets};
    use crate::process_manager::testing::{StubEstimator, StubTranscoder};
    use std::time::Duration;
    use tempfile::TempDir;

    struct TestService {
        _dir: TempDir,
        service: JobService,
        upload: std::path::PathBuf,
    }

    fn service() -> TestService {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("data"));
        layout.initialize().unwrap();
        let assets = write_template_assets(&dir.path().join("assets"));
        let upload = dir.path().join("upload.mp4");
        std::fs::write(&upload, b"video bytes").unwrap();

        let service = JobService::new(
            layout,
            assets,
            Arc::new(StubEstimator {
                detections: upright_detections(2, 0.01),
                fail_with: None,
            }),
            Arc::new(StubTranscoder { fail: false }),
        );
        TestService {
            _dir: dir,
            service,
            upload,
        }
    }

    async fn wait_terminal(service: &JobService, job_id: &str) -> crate::models::Job {
        for _ in 0..500 {
            if let Some(job) = service.get_job(job_id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    #[tokio::test]
    async fn test_create_job_runs_to_success() {
        let test = service();
        let job_id = test
            .service
            .create_job(&test.upload, JobConfig::default())
            .unwrap();

        let job = wait_terminal(&test.service, &job_id).await;
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.progress, 100);
        assert_eq!(job.config.pose_model, "mediapipe");

        let artifacts = test.service.get_artifacts(&job_id).unwrap();
        assert_eq!(artifacts.len(), 5);
    }

    #[tokio::test]
    async fn test_create_job_rejects_missing_video() {
        let test = service();
        let err = test
            .service
            .create_job(Path::new("/nope/missing.mp4"), JobConfig::default())
            .unwrap_err();
        assert!(err.contains("Input file not found"));
        assert!(test.service.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_contracts_for_unknown_id() {
        let test = service();
        assert!(test.service.get_job("ghost").is_none());
        assert!(test.service.get_artifacts("ghost").is_none());
        assert!(test.service.delete_job("ghost", false).is_err());
    }

    #[tokio::test]
    async fn test_list_jobs_most_recent_first() {
        let test = service();
        let first = test
            .service
            .create_job(&test.upload, JobConfig::default())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = test
            .service
            .create_job(&test.upload, JobConfig::default())
            .unwrap();

        let listed = test.service.list_jobs();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].id, first);

        wait_terminal(&test.service, &first).await;
        wait_terminal(&test.service, &second).await;
    }

    #[tokio::test]
    async fn test_delete_job_removes_record_and_output() {
        let test = service();
        let job_id = test
            .service
            .create_job(&test.upload, JobConfig::default())
            .unwrap();
        wait_terminal(&test.service, &job_id).await;

        let job_dir = test._dir.path().join("data/jobs").join(&job_id);
        assert!(job_dir.exists());
        test.service.delete_job(&job_id, true).unwrap();
        assert!(test.service.get_job(&job_id).is_none());
        assert!(!job_dir.exists());
    }

    #[tokio::test]
    async fn test_failed_job_reports_error_and_partial_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("data"));
        layout.initialize().unwrap();
        let assets = write_template_assets(&dir.path().join("assets"));
        let upload = dir.path().join("upload.mp4");
        std::fs::write(&upload, b"video bytes").unwrap();

        let service = JobService::new(
            layout,
            assets,
            Arc::new(StubEstimator {
                detections: upright_detections(0, 0.0),
                fail_with: Some("GPU not available".to_string()),
            }),
            Arc::new(StubTranscoder { fail: false }),
        );

        let job_id = service.create_job(&upload, JobConfig::default()).unwrap();
        let job = wait_terminal(&service, &job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("GPU not available"));
        let names: Vec<String> = job.artifacts.iter().map(|a| a.name.clone()).collect();
        assert!(names.contains(&"original.mp4".to_string()));
        assert!(names.contains(&"pose_extract.log".to_string()));
    }
}
