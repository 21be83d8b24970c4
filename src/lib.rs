pub mod commands;
pub mod file_manager;
pub mod keypoints;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod process_manager;
pub mod registry;
pub mod retarget;
pub mod utils;

pub use commands::JobService;
pub use models::{Artifact, ArtifactKind, Job, JobConfig, JobStatus, PoseDataset, SkeletonDocument};
pub use pipeline::PipelineError;
pub use process_manager::{
    FfmpegTranscoder, PoseEstimator, ProcessPoseEstimator, VideoTranscoder,
};
pub use registry::JobRegistry;
pub use retarget::{RetargetMap, RETARGET_ANIMATION_NAME};
pub use utils::{AssetSet, StorageLayout};

use std::sync::Arc;

/// Builds a service on the platform data directory with the external
/// process implementations. Embeddings that need isolated storage or stub
/// collaborators construct `JobService` directly.
pub fn init() -> Result<JobService, String> {
    let layout = StorageLayout::new(StorageLayout::default_root());
    layout.initialize()?;

    Ok(JobService::new(
        layout,
        AssetSet::default(),
        Arc::new(ProcessPoseEstimator::discover()),
        Arc::new(FfmpegTranscoder::discover()),
    ))
}
