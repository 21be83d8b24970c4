//! Logging utilities for Pantomime
//! Captures external-process output into the per-job log artifacts

use log::debug;
use std::fs;
use std::path::Path;

/// Formats captured stdout/stderr the way job logs store them.
pub fn format_process_log(stdout: &str, stderr: &str) -> String {
    format!("STDOUT:\n{}\n\nSTDERR:\n{}", stdout, stderr)
}

/// Best-effort write of a process capture. The pipeline never fails
/// because a log could not be written.
pub fn write_process_log(path: &Path, stdout: &str, stderr: &str) {
    if let Err(e) = fs::write(path, format_process_log(stdout, stderr)) {
        debug!("Failed to write process log {:?}: {}", path, e);
    }
}

/// Last `n` lines of whichever stream has content, stderr preferred.
/// Failure messages carry this instead of the full capture.
pub fn output_tail(stdout: &str, stderr: &str, n: usize) -> String {
    let source = if stderr.is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
