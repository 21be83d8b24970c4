// Storage layout for per-job artifact directories and template assets
use std::fs;
use std::path::{Path, PathBuf};

pub const ORIGINAL_VIDEO: &str = "original.mp4";
pub const OVERLAY_VIDEO: &str = "pose_overlay.mp4";
pub const RAW_LANDMARKS: &str = "raw_landmarks.json";
pub const POSE_DATASET: &str = "pose_2d.json";
pub const ANIMATION_JSON: &str = "spine_animation.json";
pub const ANIMATION_ATLAS: &str = "spine_animation.atlas";
pub const PROCESS_LOG: &str = "pose_extract.log";

/// Where a deployment keeps job output. Injected everywhere instead of a
/// process-global so tests can run on throwaway roots.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform data directory fallback used by `init`.
    pub fn default_root() -> PathBuf {
        let base_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base_dir.join("Pantomime")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(job_id)
    }

    pub fn original_video_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(ORIGINAL_VIDEO)
    }

    pub fn overlay_video_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(OVERLAY_VIDEO)
    }

    pub fn raw_landmarks_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(RAW_LANDMARKS)
    }

    pub fn pose_dataset_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(POSE_DATASET)
    }

    pub fn animation_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(ANIMATION_JSON)
    }

    pub fn animation_atlas_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(ANIMATION_ATLAS)
    }

    pub fn process_log_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(PROCESS_LOG)
    }

    /// Location recorded in artifact lists; relative so any file-serving
    /// frontend can resolve it against its own mount point.
    pub fn artifact_location(&self, job_id: &str, name: &str) -> String {
        format!("/jobs/{}/{}", job_id, name)
    }

    pub fn initialize(&self) -> Result<(), String> {
        let jobs_dir = self.jobs_dir();
        if !jobs_dir.exists() {
            fs::create_dir_all(&jobs_dir)
                .map_err(|e| format!("Failed to create directory {:?}: {}", jobs_dir, e))?;
        }
        Ok(())
    }

    pub fn create_job_dir(&self, job_id: &str) -> Result<PathBuf, String> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create directory {:?}: {}", dir, e))?;
        Ok(dir)
    }
}

/// The skeleton template asset triple the retarget stage copies from.
#[derive(Debug, Clone)]
pub struct AssetSet {
    pub template: PathBuf,
    pub atlas: PathBuf,
    pub texture: PathBuf,
}

impl AssetSet {
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            template: dir.join("figure.json"),
            atlas: dir.join("figure.atlas"),
            texture: dir.join("figure.png"),
        }
    }
}

impl Default for AssetSet {
    fn default() -> Self {
        Self::from_dir(&PathBuf::from("assets/skeleton"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths_nest_under_jobs_dir() {
        let layout = StorageLayout::new("/tmp/pantomime-test");
        let dir = layout.job_dir("abc");
        assert_eq!(dir, PathBuf::from("/tmp/pantomime-test/jobs/abc"));
        assert_eq!(
            layout.pose_dataset_path("abc"),
            dir.join("pose_2d.json")
        );
    }

    #[test]
    fn test_artifact_location_is_relative_url() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.artifact_location("abc", ORIGINAL_VIDEO),
            "/jobs/abc/original.mp4"
        );
    }

    #[test]
    fn test_initialize_creates_jobs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.initialize().unwrap();
        assert!(layout.jobs_dir().is_dir());
        let job_dir = layout.create_job_dir("abc").unwrap();
        assert!(job_dir.is_dir());
    }

    #[test]
    fn test_asset_set_from_dir() {
        let assets = AssetSet::from_dir(Path::new("assets/skeleton"));
        assert!(assets.template.ends_with("figure.json"));
        assert!(assets.atlas.ends_with("figure.atlas"));
        assert!(assets.texture.ends_with("figure.png"));
    }
}
