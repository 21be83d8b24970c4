// Skeleton interchange document (bones / slots / skins / animations)
//
// The template is externally authored; every field this crate does not
// interpret is carried through serialization untouched so downstream
// consumers of the format keep working.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Document header. `images` is rewritten to point at the job directory
/// when the template's texture is copied alongside the animation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A bone in the target skeleton's rooted tree. `rotation` is the local
/// setup rotation in degrees, relative to the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BoneDef {
    pub fn setup_rotation(&self) -> f64 {
        self.rotation.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDocument {
    pub skeleton: SkeletonHeader,
    pub bones: Vec<BoneDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skins: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub animations: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ik: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SkeletonDocument {
    /// Name → bone index for O(1) lookup during retargeting.
    pub fn bone_index(&self) -> HashMap<&str, &BoneDef> {
        self.bones.iter().map(|b| (b.name.as_str(), b)).collect()
    }

    /// Checks that every non-root bone's parent exists. Cycles are caught
    /// separately while resolving setup globals.
    pub fn validate_parents(&self) -> Result<(), String> {
        let names: HashMap<&str, ()> = self.bones.iter().map(|b| (b.name.as_str(), ())).collect();
        for bone in &self.bones {
            if let Some(parent) = &bone.parent {
                if !names.contains_key(parent.as_str()) {
                    return Err(format!(
                        "bone '{}' references unknown parent '{}'",
                        bone.name, parent
                    ));
                }
            }
        }
        Ok(())
    }

    /// Adds (or replaces) one named animation, keeping all others.
    pub fn insert_animation(&mut self, name: &str, animation: Value) {
        self.animations.insert(name.to_string(), animation);
    }

    /// Empties any IK / transform / path constraint lists present in the
    /// template so they cannot fight the forward-kinematics rotate tracks.
    pub fn strip_constraints(&mut self) {
        if self.ik.is_some() {
            self.ik = Some(Value::Array(vec![]));
        }
        if self.transform.is_some() {
            self.transform = Some(Value::Array(vec![]));
        }
        if self.path.is_some() {
            self.path = Some(Value::Array(vec![]));
        }
    }
}
