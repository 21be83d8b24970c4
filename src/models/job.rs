// Conversion job data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a conversion job.
///
/// `Queued` and `Canceled` are reserved for a future admission-control and
/// cancellation layer; no current transition enters them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Immutable per-job configuration chosen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    pub pose_model: String,
    pub smooth: bool,
    pub retarget: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            pose_model: "mediapipe".to_string(),
            smooth: true,
            retarget: "rotate".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Json,
    Log,
}

/// One output file of a job, addressed by a location the caller can serve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(rename = "url")]
    pub location: String,
    #[serde(rename = "size")]
    pub byte_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8, // 0-100
    pub config: JobConfig,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, config: JobConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Created,
            progress: 0,
            config,
            artifacts: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
