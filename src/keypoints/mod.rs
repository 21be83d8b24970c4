// Keypoint normalization: raw index-addressed landmark frames from the
// estimator become the canonical named joint dataset.
use crate::models::{FrameSample, JointSample, PoseDataset, PoseMeta, RawDetections};
use std::collections::HashMap;

/// Landmark subset of the estimator's 33-point schema. Index-addressed in
/// the raw document, name-addressed everywhere downstream.
pub const LANDMARK_NAMES: [(usize, &str); 13] = [
    (0, "nose"),
    (11, "left_shoulder"),
    (12, "right_shoulder"),
    (13, "left_elbow"),
    (14, "right_elbow"),
    (15, "left_wrist"),
    (16, "right_wrist"),
    (23, "left_hip"),
    (24, "right_hip"),
    (25, "left_knee"),
    (26, "right_knee"),
    (27, "left_ankle"),
    (28, "right_ankle"),
];

/// Schema tag recorded in the dataset metadata.
pub const KEYPOINT_SCHEMA: &str = "33->17";

const SMOOTHING_ALPHA: f64 = 0.6;
const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Exponential moving average over one axis of one joint. The first
/// observed sample seeds the state unsmoothed.
#[derive(Debug, Clone, Copy)]
struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    fn update(&mut self, raw: f64) -> f64 {
        let next = match self.value {
            None => raw,
            Some(prev) => prev + self.alpha * (raw - prev),
        };
        self.value = Some(next);
        next
    }
}

/// Builds the canonical pose dataset from raw detections.
///
/// Every input frame keeps its slot: frames with no detected pose carry an
/// empty joint list so frame count and timing stay aligned with the source
/// video. Smoothing state is per joint name per axis and lives only for
/// this call.
pub fn normalize_detections(
    raw: &RawDetections,
    smooth: bool,
    source_video: &str,
) -> PoseDataset {
    let fps = if raw.fps > 0.0 { raw.fps } else { 30.0 };
    let width = raw.width as f64;
    let height = raw.height as f64;

    let mut smoothers: HashMap<&str, (Ema, Ema)> = HashMap::new();

    let mut frames = Vec::with_capacity(raw.frames.len());
    for (index, raw_frame) in raw.frames.iter().enumerate() {
        let mut joints = Vec::new();
        for &(landmark_index, name) in LANDMARK_NAMES.iter() {
            let Some(landmark) = raw_frame.landmarks.get(landmark_index) else {
                continue;
            };
            let raw_x = landmark.x * width;
            let raw_y = landmark.y * height;
            let (x, y) = if smooth {
                let (ema_x, ema_y) = smoothers
                    .entry(name)
                    .or_insert_with(|| (Ema::new(SMOOTHING_ALPHA), Ema::new(SMOOTHING_ALPHA)));
                (ema_x.update(raw_x), ema_y.update(raw_y))
            } else {
                (raw_x, raw_y)
            };
            joints.push(JointSample {
                name: name.to_string(),
                x,
                y,
                confidence: DEFAULT_CONFIDENCE,
            });
        }
        frames.push(FrameSample {
            t: index as f64 / fps,
            joints,
        });
    }

    PoseDataset {
        meta: PoseMeta {
            fps,
            frame_count: frames.len(),
            keypoint_schema: KEYPOINT_SCHEMA.to_string(),
            source_video: source_video.to_string(),
        },
        frames,
    }
}
