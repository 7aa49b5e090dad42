//! Lip-sync job execution

pub mod runner;

pub use runner::SyncRunner;

use std::path::PathBuf;

/// Inputs for one run of the external sync tool
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    pub log_path: PathBuf,
}

impl SyncRequest {
    /// File name broadcast to clients when the run succeeds
    pub fn output_name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output.display().to_string())
    }
}
