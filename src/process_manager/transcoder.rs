// Video transcoder process management
// Normalizes container/codec in place; every failure is non-fatal to callers

use async_trait::async_trait;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("transcoder exited with code {0}")]
    ExitCode(i32),
    #[error("failed to run transcoder: {0}")]
    Io(#[from] std::io::Error),
}

/// External video normalization capability. `normalize` rewrites the file
/// at `input` in place; callers log and discard errors by contract.
#[async_trait]
pub trait VideoTranscoder: Send + Sync {
    async fn normalize(&self, input: &Path, log_path: &Path) -> Result<(), TranscodeError>;
}

/// H.264/yuv420p/faststart re-encode through an ffmpeg binary.
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `FFMPEG_PATH` override, otherwise `ffmpeg` on PATH.
    pub fn discover() -> Self {
        let program = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());
        Self::new(program)
    }
}

/// Sibling log next to the job's process log (`pose_extract.ffmpeg.log`).
pub fn ffmpeg_log_path(log_path: &Path) -> PathBuf {
    log_path.with_extension("ffmpeg.log")
}

/// Staging path the encode targets before the rename over the input.
fn staged_output_path(input: &Path) -> PathBuf {
    input.with_extension("h264.mp4")
}

#[async_trait]
impl VideoTranscoder for FfmpegTranscoder {
    async fn normalize(&self, input: &Path, log_path: &Path) -> Result<(), TranscodeError> {
        let staged = staged_output_path(input);

        let output = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-movflags", "+faststart"])
            .args(["-preset", "veryfast"])
            .arg(&staged)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Err(e) = fs::write(
            ffmpeg_log_path(log_path),
            format!("FFMPEG OUT:\n{}\n\nFFMPEG ERR:\n{}", stdout, stderr),
        ) {
            debug!("Failed to write ffmpeg log: {}", e);
        }

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(TranscodeError::ExitCode(output.status.code().unwrap_or(-1)));
        }

        tokio::fs::rename(&staged, input).await?;
        Ok(())
    }
}
