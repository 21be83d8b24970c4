// Forward-kinematics retargeting: per-frame 2D joint directions are solved
// into local bone rotations on the target skeleton and injected as one new
// named animation.
//
// Source coordinates have y growing downward (pixel space); the target
// skeleton has y growing upward. Negating the source direction angle is the
// single coordinate-system correction, applied exactly once per bone per
// frame.
use crate::models::{PoseDataset, SkeletonDocument};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Name of the animation entry injected into the skeleton document.
pub const RETARGET_ANIMATION_NAME: &str = "video_retarget_v2";

/// Bone that receives the pelvis translation track.
pub const TRANSLATION_BONE: &str = "hip";

#[derive(Debug, Error)]
pub enum RetargetError {
    #[error("bone '{bone}' references unknown parent '{parent}'")]
    UnknownParent { bone: String, parent: String },
    #[error("cycle in bone hierarchy at '{0}'")]
    CyclicHierarchy(String),
}

/// Target-bone → (start joint, end joint) table. The bone's rotation tracks
/// the direction from start to end.
#[derive(Debug, Clone, Default)]
pub struct RetargetMap {
    entries: BTreeMap<String, (String, String)>,
}

impl RetargetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bone: &str, start: &str, end: &str) {
        self.entries
            .insert(bone.to_string(), (start.to_string(), end.to_string()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &(String, String))> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in biped profile. The foot entries reference toe joints the
    /// landmark subset never produces, so those bones stay at their setup
    /// pose; the root entry is deliberately degenerate for the same effect.
    pub fn biped() -> Self {
        let mut map = Self::new();
        map.insert("root", "mid_hip", "mid_hip");
        map.insert("hip", "mid_hip", "mid_shoulder");
        map.insert("torso", "mid_hip", "mid_shoulder");
        map.insert("head", "mid_shoulder", "nose");
        map.insert("rear_thigh", "left_hip", "left_knee");
        map.insert("rear_shin", "left_knee", "left_ankle");
        map.insert("rear_foot", "left_ankle", "left_foot_index");
        map.insert("front_thigh", "right_hip", "right_knee");
        map.insert("front_shin", "right_knee", "right_ankle");
        map.insert("front_foot", "right_ankle", "right_foot_index");
        map.insert("rear_upper_arm", "left_shoulder", "left_elbow");
        map.insert("rear_bracer", "left_elbow", "left_wrist");
        map.insert("front_upper_arm", "right_shoulder", "right_elbow");
        map.insert("front_bracer", "right_elbow", "right_wrist");
        map
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RotateKey {
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranslateKey {
    pub time: f64,
    pub x: f64,
    pub y: f64,
}

/// Keyframe tracks for one bone. Empty lists are dropped from output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoneTimeline {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rotate: Vec<RotateKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translate: Vec<TranslateKey>,
}

impl BoneTimeline {
    pub fn is_empty(&self) -> bool {
        self.rotate.is_empty() && self.translate.is_empty()
    }
}

/// Normalizes an angle into (-180, 180] by repeated ±360 adjustment.
/// -180 comes out as +180 so the boundary has a single representation.
pub fn normalize_angle(mut degrees: f64) -> f64 {
    while degrees > 180.0 {
        degrees -= 360.0;
    }
    while degrees <= -180.0 {
        degrees += 360.0;
    }
    degrees
}

/// Direction of the vector (dx, dy) in degrees. Axis-aligned inputs come
/// out exact rather than through the radians round trip.
fn direction_degrees(dx: f64, dy: f64) -> f64 {
    if dy == 0.0 {
        return if dx < 0.0 { 180.0 } else { 0.0 };
    }
    if dx == 0.0 {
        return if dy > 0.0 { 90.0 } else { -90.0 };
    }
    dy.atan2(dx).to_degrees()
}

/// Resolves every bone's global setup rotation (sum of local setup
/// rotations up to the root). Memoized per call; walks each chain at most
/// once. The hierarchy is externally authored, so unknown parents and
/// cycles are reported instead of trusted.
pub fn setup_globals(doc: &SkeletonDocument) -> Result<HashMap<String, f64>, RetargetError> {
    let bones = doc.bone_index();
    let mut resolved: HashMap<String, f64> = HashMap::with_capacity(doc.bones.len());

    for bone in &doc.bones {
        if resolved.contains_key(&bone.name) {
            continue;
        }
        let mut path = Vec::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut current = bone;
        let mut base = 0.0;
        loop {
            if let Some(global) = resolved.get(current.name.as_str()) {
                base = *global;
                break;
            }
            if !visiting.insert(current.name.as_str()) {
                return Err(RetargetError::CyclicHierarchy(current.name.clone()));
            }
            path.push(current);
            match current.parent.as_deref() {
                None => break,
                Some(parent) => match bones.get(parent) {
                    Some(def) => current = *def,
                    None => {
                        return Err(RetargetError::UnknownParent {
                            bone: current.name.clone(),
                            parent: parent.to_string(),
                        })
                    }
                },
            }
        }
        for def in path.iter().rev() {
            base += def.setup_rotation();
            resolved.insert(def.name.clone(), base);
        }
    }
    Ok(resolved)
}

/// Solves keyframe tracks for every mapped bone across the dataset.
///
/// Per frame: each mapped bone's target global rotation is the negated
/// source direction of its joint pair, falling back to its setup global
/// when an endpoint is missing or the pair is degenerate. The local value
/// is `target - parentGlobal - setupRotation`, where a mapped parent
/// contributes its own animated target for the same frame and an unmapped
/// parent stays rigid at its setup global.
pub fn solve(
    dataset: &PoseDataset,
    doc: &SkeletonDocument,
    map: &RetargetMap,
) -> Result<BTreeMap<String, BoneTimeline>, RetargetError> {
    let bones = doc.bone_index();
    let globals = setup_globals(doc)?;
    let fps = dataset.effective_fps();
    let first_hip = dataset.frames.first().and_then(|f| f.joint("mid_hip"));

    let mut timelines: BTreeMap<String, BoneTimeline> = BTreeMap::new();

    for (i, frame) in dataset.frames.iter().enumerate() {
        let time = i as f64 / fps;

        let mut frame_globals: HashMap<&str, f64> = HashMap::with_capacity(map.len());
        for (bone_name, (start, end)) in map.iter() {
            let fallback = globals.get(bone_name.as_str()).copied().unwrap_or(0.0);
            let target = if start != end {
                match (frame.joint(start), frame.joint(end)) {
                    (Some((sx, sy)), Some((ex, ey))) => -direction_degrees(ex - sx, ey - sy),
                    _ => fallback,
                }
            } else {
                fallback
            };
            frame_globals.insert(bone_name.as_str(), target);
        }

        for (bone_name, _) in map.iter() {
            let def = match bones.get(bone_name.as_str()) {
                Some(def) => def,
                None => continue,
            };
            let parent = match def.parent.as_deref() {
                Some(parent) => parent,
                None => continue, // the root keeps no rotate track
            };
            let target_global = frame_globals[bone_name.as_str()];
            let parent_global = frame_globals
                .get(parent)
                .copied()
                .or_else(|| globals.get(parent).copied())
                .unwrap_or(0.0);
            let local = normalize_angle(target_global - parent_global - def.setup_rotation());
            if local.is_finite() {
                timelines
                    .entry(bone_name.clone())
                    .or_default()
                    .rotate
                    .push(RotateKey { time, value: local });
            }
        }

        if let (Some((x0, y0)), Some((x, y))) = (first_hip, frame.joint("mid_hip")) {
            timelines
                .entry(TRANSLATION_BONE.to_string())
                .or_default()
                .translate
                .push(TranslateKey {
                    time,
                    x: x - x0,
                    y: -(y - y0),
                });
        }
    }

    Ok(timelines)
}

/// Runs the solver and injects the result into the skeleton document as a
/// new named animation, preserving pre-existing animations and emptying
/// any constraint lists. Returns the names of bones that kept at least one
/// non-empty track.
pub fn retarget(
    dataset: &PoseDataset,
    doc: &mut SkeletonDocument,
    map: &RetargetMap,
) -> Result<Vec<String>, RetargetError> {
    let timelines = solve(dataset, doc, map)?;

    let mut bone_tracks = Map::new();
    let mut retained = Vec::new();
    for (name, timeline) in timelines {
        if timeline.is_empty() {
            continue;
        }
        let value = serde_json::to_value(&timeline).unwrap_or(Value::Null);
        bone_tracks.insert(name.clone(), value);
        retained.push(name);
    }

    doc.insert_animation(RETARGET_ANIMATION_NAME, json!({ "bones": bone_tracks }));
    doc.strip_constraints();
    Ok(retained)
}
