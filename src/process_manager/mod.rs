// External process capabilities (pose estimator, video transcoder)
pub mod pose_estimator;
pub mod transcoder;

pub use pose_estimator::*;
pub use transcoder::*;

#[cfg(test)]
pub mod testing {
    //! Stub capabilities for pipeline and service tests.
    use super::{ExtractionError, PoseEstimator, TranscodeError, VideoTranscoder};
    use crate::file_manager::write_json_file_compact;
    use crate::logging::write_process_log;
    use crate::models::RawDetections;
    use async_trait::async_trait;
    use std::path::Path;

    /// Plays the estimator role in-process: writes the canned detections
    /// and a placeholder overlay, or fails after logging like the real
    /// process integration does.
    pub struct StubEstimator {
        pub detections: RawDetections,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl PoseEstimator for StubEstimator {
        async fn extract(
            &self,
            _video: &Path,
            overlay_out: &Path,
            raw_out: &Path,
            log_path: &Path,
        ) -> Result<(), ExtractionError> {
            write_process_log(log_path, "frames processed", "");
            if let Some(message) = &self.fail_with {
                return Err(ExtractionError(message.clone()));
            }
            std::fs::write(overlay_out, b"overlay").map_err(|e| ExtractionError(e.to_string()))?;
            write_json_file_compact(raw_out, &self.detections).map_err(ExtractionError)?;
            Ok(())
        }
    }

    pub struct StubTranscoder {
        pub fail: bool,
    }

    #[async_trait]
    impl VideoTranscoder for StubTranscoder {
        async fn normalize(&self, _input: &Path, _log_path: &Path) -> Result<(), TranscodeError> {
            if self.fail {
                Err(TranscodeError::ExitCode(1))
            } else {
                Ok(())
            }
        }
    }
}
