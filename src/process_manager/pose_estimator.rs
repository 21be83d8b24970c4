// Pose estimator process management
// Runs the external landmark detector and captures its output

use crate::logging::{output_tail, write_process_log};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Lines of captured process output carried in a failure message.
const FAILURE_TAIL_LINES: usize = 6;

#[derive(Debug, Error)]
#[error("pose extraction failed: {0}")]
pub struct ExtractionError(pub String);

/// External pose estimation capability. Implementations run out of
/// process: given a source video they must write an annotated overlay
/// video and an index-addressed raw detections document to the given
/// paths, and their combined output is captured to `log_path`.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn extract(
        &self,
        video: &Path,
        overlay_out: &Path,
        raw_out: &Path,
        log_path: &Path,
    ) -> Result<(), ExtractionError>;
}

/// Runs a worker script through a discovered interpreter.
pub struct ProcessPoseEstimator {
    interpreter: String,
    script: PathBuf,
}

impl ProcessPoseEstimator {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }

    /// Probes for a Python interpreter and the workers directory next to
    /// the executable (walking up for development layouts), falling back
    /// to the working directory.
    pub fn discover() -> Self {
        Self::new(find_interpreter(), workers_dir().join("pose_estimator.py"))
    }
}

fn find_interpreter() -> String {
    for candidate in ["python3", "python"] {
        if std::process::Command::new(candidate)
            .arg("--version")
            .output()
            .is_ok()
        {
            return candidate.to_string();
        }
    }
    "python3".to_string()
}

fn workers_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let workers = exe_dir.join("workers");
            if workers.exists() {
                return workers;
            }
            let mut current = exe_dir;
            for _ in 0..3 {
                if let Some(parent) = current.parent() {
                    let dev_workers = parent.join("workers");
                    if dev_workers.exists() {
                        debug!("Found workers at: {:?}", dev_workers);
                        return dev_workers;
                    }
                    current = parent;
                }
            }
        }
    }

    std::env::current_dir()
        .unwrap_or_default()
        .join("workers")
}

#[async_trait]
impl PoseEstimator for ProcessPoseEstimator {
    async fn extract(
        &self,
        video: &Path,
        overlay_out: &Path,
        raw_out: &Path,
        log_path: &Path,
    ) -> Result<(), ExtractionError> {
        if !self.script.exists() {
            return Err(ExtractionError(format!(
                "worker script not found: {:?}",
                self.script
            )));
        }

        debug!("Spawning pose estimator: {:?}", self.script);

        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(video)
            .arg(overlay_out)
            .arg(raw_out)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError(format!("failed to spawn estimator: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        write_process_log(log_path, &stdout, &stderr);

        let exit_code = output.status.code().unwrap_or(-1);
        debug!("Pose estimator exited with code: {}", exit_code);

        if !output.status.success() {
            return Err(ExtractionError(output_tail(
                &stdout,
                &stderr,
                FAILURE_TAIL_LINES,
            )));
        }

        if !raw_out.exists() {
            return Err(ExtractionError(
                "estimator exited cleanly but wrote no detections file".to_string(),
            ));
        }

        Ok(())
    }
}
