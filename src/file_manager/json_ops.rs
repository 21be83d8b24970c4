// Atomic JSON document operations
//
// Pose datasets and skeleton documents are written through the same
// temp-then-rename path so a stage never observes a half-written file.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let _lock = FILE_LOCK.lock().map_err(|e| format!("Lock error: {}", e))?;

    if !path.exists() {
        return Err(format!("File not found: {:?}", path));
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse JSON from {:?}: {}", path, e))
}

/// Writes human-readable JSON atomically (write-to-temp-then-rename).
/// Used for the skeleton animation output, which people diff and inspect.
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), String> {
    let json_string = serde_json::to_string_pretty(data)
        .map_err(|e| format!("Failed to serialize data: {}", e))?;
    write_atomic(path, json_string.as_bytes())
}

/// Writes compact JSON atomically. Used for per-frame documents (raw
/// detections, pose dataset) where pretty-printing multiplies file size.
pub fn write_json_file_compact<T: Serialize>(path: &Path, data: &T) -> Result<(), String> {
    let json_string =
        serde_json::to_string(data).map_err(|e| format!("Failed to serialize data: {}", e))?;
    write_atomic(path, json_string.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let _lock = FILE_LOCK.lock().map_err(|e| format!("Lock error: {}", e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {:?}: {}", parent, e))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path)
        .map_err(|e| format!("Failed to create temp file {:?}: {}", temp_path, e))?;

    temp_file
        .write_all(bytes)
        .map_err(|e| format!("Failed to write to temp file: {}", e))?;

    temp_file
        .sync_all()
        .map_err(|e| format!("Failed to sync temp file: {}", e))?;

    fs::rename(&temp_path, path)
        .map_err(|e| format!("Failed to rename temp file to {:?}: {}", path, e))?;

    Ok(())
}
