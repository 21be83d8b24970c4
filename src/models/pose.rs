// Pose data models: raw estimator detections and the canonical 2D dataset
use serde::{Deserialize, Serialize};

/// One landmark as reported by the estimator, coordinates normalized to [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawLandmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub visibility: f64,
}

/// One video frame of raw detections. An empty landmark list means the
/// estimator found no pose in that frame; the frame slot is still kept so
/// timing stays aligned with the source video.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(default)]
    pub landmarks: Vec<RawLandmark>,
}

/// Index-addressed landmark document written by the external estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetections {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<RawFrame>,
}

/// A named 2D joint in source-pixel space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointSample {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "c")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSample {
    pub t: f64,
    pub joints: Vec<JointSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseMeta {
    pub fps: f64,
    pub frame_count: usize,
    pub keypoint_schema: String,
    pub source_video: String,
}

/// Canonical per-frame joint dataset (`pose_2d.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseDataset {
    pub meta: PoseMeta,
    pub frames: Vec<FrameSample>,
}

impl FrameSample {
    fn named(&self, name: &str) -> Option<(f64, f64)> {
        self.joints
            .iter()
            .find(|j| j.name == name)
            .map(|j| (j.x, j.y))
    }

    fn midpoint(&self, left: &str, right: &str) -> Option<(f64, f64)> {
        match (self.named(left), self.named(right)) {
            (Some((lx, ly)), Some((rx, ry))) => Some(((lx + rx) / 2.0, (ly + ry) / 2.0)),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }

    /// Resolve a joint by name, including the two derived virtual joints.
    /// A virtual joint is the midpoint of its left/right pair, or the one
    /// side that is present when the other is missing.
    pub fn joint(&self, name: &str) -> Option<(f64, f64)> {
        match name {
            "mid_hip" => self.midpoint("left_hip", "right_hip"),
            "mid_shoulder" => self.midpoint("left_shoulder", "right_shoulder"),
            _ => self.named(name),
        }
    }
}

impl PoseDataset {
    /// Frame rate for keyframe timing; falls back to 30 when the metadata
    /// reports a non-positive rate.
    pub fn effective_fps(&self) -> f64 {
        if self.meta.fps > 0.0 {
            self.meta.fps
        } else {
            30.0
        }
    }
}
