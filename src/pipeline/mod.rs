// Conversion pipeline: drives one job through copy -> extraction ->
// retargeting -> artifact publication.
//
// The pipeline holds no engine logic; it sequences the stages, records
// progress at the 10/50/90/100 checkpoints, and decides what survives a
// failure. Fatal errors from any stage are caught once at the top of the
// task and become the job's terminal FAILED record.
use crate::file_manager::{read_json_file, write_json_file, write_json_file_compact};
use crate::keypoints::normalize_detections;
use crate::models::{Artifact, ArtifactKind, RawDetections, SkeletonDocument};
use crate::process_manager::{ExtractionError, PoseEstimator, VideoTranscoder};
use crate::registry::JobRegistry;
use crate::retarget::{self, RetargetError, RetargetMap};
use crate::utils::{
    AssetSet, StorageLayout, ANIMATION_JSON, ORIGINAL_VIDEO, OVERLAY_VIDEO, POSE_DATASET,
    PROCESS_LOG,
};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Fatal pipeline failures. Best-effort steps (re-encodes, partial
/// artifact enumeration) have their own non-propagating result types and
/// never appear here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pose extraction failed: {0}")]
    Extraction(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("missing asset: {0}")]
    AssetMissing(String),
    #[error("io failure: {0}")]
    Io(String),
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        PipelineError::Extraction(e.0)
    }
}

impl From<RetargetError> for PipelineError {
    fn from(e: RetargetError) -> Self {
        PipelineError::MalformedInput(e.to_string())
    }
}

/// Everything a job task needs, bundled so one handle can be moved into
/// `tokio::spawn`.
pub struct PipelineContext {
    pub registry: Arc<JobRegistry>,
    pub layout: StorageLayout,
    pub assets: AssetSet,
    pub estimator: Arc<dyn PoseEstimator>,
    pub transcoder: Arc<dyn VideoTranscoder>,
}

/// Files published as artifacts, in the order job records list them.
const ARTIFACT_FILES: [(&str, ArtifactKind); 5] = [
    (ORIGINAL_VIDEO, ArtifactKind::Video),
    (POSE_DATASET, ArtifactKind::Json),
    (OVERLAY_VIDEO, ArtifactKind::Video),
    (ANIMATION_JSON, ArtifactKind::Json),
    (PROCESS_LOG, ArtifactKind::Log),
];

/// Every accepted retarget strategy currently resolves to the single
/// rotation solver and its biped profile.
fn resolve_retarget_map(_strategy: &str) -> RetargetMap {
    RetargetMap::biped()
}

/// Drives one job to a terminal state. Never returns an error: failures
/// end up on the job record, and other jobs' tasks are unaffected.
pub async fn run_job(ctx: Arc<PipelineContext>, job_id: String, upload_path: PathBuf) {
    ctx.registry.mark_running(&job_id);
    ctx.registry.set_progress(&job_id, 10);

    match run_stages(&ctx, &job_id, &upload_path).await {
        Ok(artifacts) => {
            ctx.registry.complete(&job_id, artifacts);
            info!("[job {}] succeeded", job_id);
        }
        Err(e) => {
            error!("[job {}] failed: {}", job_id, e);
            let partial = enumerate_existing_artifacts(&ctx.layout, &job_id);
            ctx.registry.fail(&job_id, e.to_string(), partial);
        }
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    job_id: &str,
    upload_path: &Path,
) -> Result<Vec<Artifact>, PipelineError> {
    let layout = &ctx.layout;
    let original_path = layout.original_video_path(job_id);
    let overlay_path = layout.overlay_video_path(job_id);
    let raw_path = layout.raw_landmarks_path(job_id);
    let pose_path = layout.pose_dataset_path(job_id);
    let animation_path = layout.animation_path(job_id);
    let log_path = layout.process_log_path(job_id);

    let config = ctx
        .registry
        .get(job_id)
        .map(|job| job.config)
        .unwrap_or_default();

    // 1. keep the upload inside the job directory so a failed job still
    // has a playable source
    tokio::fs::copy(upload_path, &original_path)
        .await
        .map_err(|e| PipelineError::Io(format!("{:?}: {}", original_path, e)))?;
    debug!("[job {}] copied original to {:?}", job_id, original_path);
    if let Err(e) = ctx.transcoder.normalize(&original_path, &log_path).await {
        debug!("[job {}] source re-encode skipped: {}", job_id, e);
    }

    // 2. extraction: external estimator, then keypoint normalization
    ctx.estimator
        .extract(&original_path, &overlay_path, &raw_path, &log_path)
        .await?;
    let raw: RawDetections = read_json_file(&raw_path).map_err(PipelineError::MalformedInput)?;
    let dataset = normalize_detections(&raw, config.smooth, &original_path.to_string_lossy());
    write_json_file_compact(&pose_path, &dataset).map_err(PipelineError::Io)?;
    info!("[job {}] pose extracted", job_id);
    ctx.registry.set_progress(job_id, 50);
    if let Err(e) = ctx.transcoder.normalize(&overlay_path, &log_path).await {
        debug!("[job {}] overlay re-encode skipped: {}", job_id, e);
    }

    // 3. retarget onto the template skeleton
    let dataset = read_json_file(&pose_path).map_err(PipelineError::MalformedInput)?;
    if !ctx.assets.template.exists() {
        return Err(PipelineError::AssetMissing(
            ctx.assets.template.display().to_string(),
        ));
    }
    let mut doc: SkeletonDocument =
        read_json_file(&ctx.assets.template).map_err(PipelineError::MalformedInput)?;

    let job_dir = layout.job_dir(job_id);
    let texture_name = ctx
        .assets
        .texture
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "figure.png".into());
    copy_asset(&ctx.assets.texture, &job_dir.join(texture_name))?;
    copy_asset(&ctx.assets.atlas, &layout.animation_atlas_path(job_id))?;
    // the texture now sits next to the animation output
    doc.skeleton.images = Some("./".to_string());

    let map = resolve_retarget_map(&config.retarget);
    retarget::retarget(&dataset, &mut doc, &map)?;
    write_json_file(&animation_path, &doc).map_err(PipelineError::Io)?;
    info!("[job {}] retarget done", job_id);
    ctx.registry.set_progress(job_id, 90);

    // 4. publish the artifact list; everything must exist at this point
    ARTIFACT_FILES
        .iter()
        .map(|(name, kind)| artifact_entry(layout, job_id, name, *kind).map_err(PipelineError::Io))
        .collect()
}

fn copy_asset(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| PipelineError::AssetMissing(format!("{}: {}", src.display(), e)))
}

fn artifact_entry(
    layout: &StorageLayout,
    job_id: &str,
    name: &str,
    kind: ArtifactKind,
) -> Result<Artifact, String> {
    let path = layout.job_dir(job_id).join(name);
    let metadata = fs::metadata(&path).map_err(|e| format!("{:?}: {}", path, e))?;
    Ok(Artifact {
        name: name.to_string(),
        kind,
        location: layout.artifact_location(job_id, name),
        byte_size: metadata.len(),
    })
}

/// Failure-path enumeration: whatever already exists is still published
/// for diagnosis, absent files are simply skipped.
fn enumerate_existing_artifacts(layout: &StorageLayout, job_id: &str) -> Vec<Artifact> {
    ARTIFACT_FILES
        .iter()
        .filter_map(|(name, kind)| artifact_entry(layout, job_id, name, *kind).ok())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobConfig, JobStatus};
    use crate::process_manager::testing::{StubEstimator, StubTranscoder};
    use crate::retarget::RETARGET_ANIMATION_NAME;
    use super::fixtures::{upright_detections, write_template_assets};
    use serde_json::Value;
    use tempfile::TempDir;

    struct TestRig {
        _dir: TempDir,
        ctx: Arc<PipelineContext>,
        upload: PathBuf,
    }

    fn rig(estimator: StubEstimator, transcoder: StubTranscoder) -> TestRig {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("data"));
        layout.initialize().unwrap();
        let assets = write_template_assets(&dir.path().join("assets"));
        let upload = dir.path().join("upload.mp4");
        std::fs::write(&upload, b"not really a video").unwrap();

        let registry = Arc::new(JobRegistry::new());
        registry.insert(Job::new("job-1".to_string(), JobConfig::default()));
        layout.create_job_dir("job-1").unwrap();

        TestRig {
            _dir: dir,
            ctx: Arc::new(PipelineContext {
                registry,
                layout,
                assets,
                estimator: Arc::new(estimator),
                transcoder: Arc::new(transcoder),
            }),
            upload,
        }
    }

    fn ok_estimator() -> StubEstimator {
        StubEstimator {
            detections: upright_detections(3, 0.01),
            fail_with: None,
        }
    }

    #[tokio::test]
    async fn test_successful_job_publishes_all_artifacts() {
        let rig = rig(ok_estimator(), StubTranscoder { fail: false });
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;

        let job = rig.ctx.registry.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.progress, 100);
        assert_eq!(job.error, None);

        let names: Vec<&str> = job.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "original.mp4",
                "pose_2d.json",
                "pose_overlay.mp4",
                "spine_animation.json",
                "pose_extract.log"
            ]
        );
        for artifact in &job.artifacts {
            assert!(artifact.byte_size > 0, "{} has size", artifact.name);
            assert!(artifact.location.starts_with("/jobs/job-1/"));
        }
    }

    #[tokio::test]
    async fn test_written_animation_document_is_well_formed() {
        let rig = rig(ok_estimator(), StubTranscoder { fail: false });
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;

        let animation_path = rig.ctx.layout.animation_path("job-1");
        let doc: SkeletonDocument =
            read_json_file(&animation_path).expect("animation output parses");

        // template animations survive, the new clip is added
        assert!(doc.animations.contains_key("idle"));
        assert!(doc.animations.contains_key(RETARGET_ANIMATION_NAME));
        // constraints are emptied so they cannot fight the FK tracks
        assert_eq!(doc.ik, Some(Value::Array(vec![])));
        // texture path points at the job directory
        assert_eq!(doc.skeleton.images.as_deref(), Some("./"));

        // injected bones carry one rotate key per frame
        let bones = doc.animations[RETARGET_ANIMATION_NAME]["bones"]
            .as_object()
            .unwrap();
        let torso_rotate = bones["torso"]["rotate"].as_array().unwrap();
        assert_eq!(torso_rotate.len(), 3);
        // hip also carries the pelvis translation track
        assert_eq!(bones["hip"]["translate"].as_array().unwrap().len(), 3);

        // copied template assets sit next to the output
        assert!(rig.ctx.layout.animation_atlas_path("job-1").exists());
        assert!(rig.ctx.layout.job_dir("job-1").join("figure.png").exists());
    }

    #[tokio::test]
    async fn test_pose_dataset_written_before_retarget_reads_it() {
        let rig = rig(ok_estimator(), StubTranscoder { fail: false });
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;

        let dataset: crate::models::PoseDataset =
            read_json_file(&rig.ctx.layout.pose_dataset_path("job-1")).unwrap();
        assert_eq!(dataset.meta.frame_count, 3);
        assert_eq!(dataset.meta.keypoint_schema, "33->17");
        assert_eq!(dataset.frames.len(), 3);
    }

    #[tokio::test]
    async fn test_estimator_failure_keeps_partial_artifacts() {
        let rig = rig(
            StubEstimator {
                detections: upright_detections(0, 0.0),
                fail_with: Some("Traceback: model not found".to_string()),
            },
            StubTranscoder { fail: false },
        );
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;

        let job = rig.ctx.registry.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert!(error.contains("pose extraction failed"));
        assert!(error.contains("model not found"));

        let names: Vec<&str> = job.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&"original.mp4"));
        assert!(names.contains(&"pose_extract.log"));
        assert!(!names.contains(&"spine_animation.json"));
    }

    #[tokio::test]
    async fn test_missing_template_fails_with_asset_error() {
        let test = rig(ok_estimator(), StubTranscoder { fail: false });
        std::fs::remove_file(&test.ctx.assets.template).unwrap();
        run_job(test.ctx.clone(), "job-1".to_string(), test.upload.clone()).await;

        let job = test.ctx.registry.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("missing asset"));
        // extraction output is still retrievable for diagnosis
        let names: Vec<&str> = job.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&"pose_2d.json"));
    }

    #[tokio::test]
    async fn test_transcoder_failure_is_non_fatal() {
        let rig = rig(ok_estimator(), StubTranscoder { fail: true });
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;

        let job = rig.ctx.registry.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_malformed_detections_fail_as_bad_input() {
        struct GarbageEstimator;
        #[async_trait::async_trait]
        impl PoseEstimator for GarbageEstimator {
            async fn extract(
                &self,
                _video: &Path,
                overlay_out: &Path,
                raw_out: &Path,
                log_path: &Path,
            ) -> Result<(), ExtractionError> {
                crate::logging::write_process_log(log_path, "done", "");
                std::fs::write(overlay_out, b"overlay").unwrap();
                std::fs::write(raw_out, b"{ \"fps\": 30.0 }").unwrap();
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("data"));
        layout.initialize().unwrap();
        let assets = write_template_assets(&dir.path().join("assets"));
        let upload = dir.path().join("upload.mp4");
        std::fs::write(&upload, b"video").unwrap();
        let registry = Arc::new(JobRegistry::new());
        registry.insert(Job::new("job-1".to_string(), JobConfig::default()));
        layout.create_job_dir("job-1").unwrap();
        let ctx = Arc::new(PipelineContext {
            registry,
            layout,
            assets,
            estimator: Arc::new(GarbageEstimator),
            transcoder: Arc::new(StubTranscoder { fail: false }),
        });

        run_job(ctx.clone(), "job-1".to_string(), upload).await;
        let job = ctx.registry.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("malformed input"));
    }

    #[tokio::test]
    async fn test_progress_checkpoints_never_regress() {
        let rig = rig(ok_estimator(), StubTranscoder { fail: false });
        run_job(rig.ctx.clone(), "job-1".to_string(), rig.upload.clone()).await;
        // after completion the record is frozen
        assert!(!rig.ctx.registry.set_progress("job-1", 5));
        assert_eq!(rig.ctx.registry.get("job-1").unwrap().progress, 100);
    }
}
