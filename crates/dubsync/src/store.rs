//! Media library
//!
//! Thin filesystem passthroughs over four directories: generated voices,
//! uploaded videos, finished results, and an uploads scratch space for
//! combined-flow files and job logs. Client-supplied names never escape
//! their directory.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

pub const VOICE_EXTENSIONS: &[&str] = &["mp3", "wav"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi"];
pub const RESULT_EXTENSIONS: &[&str] = &["mp4"];

#[derive(Debug)]
pub struct MediaStore {
    voices_dir: PathBuf,
    videos_dir: PathBuf,
    results_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl MediaStore {
    /// `data_dir` holds the `voices/` and `videos/` libraries; results and
    /// uploads live in their own directories.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            voices_dir: data_dir.join("voices"),
            videos_dir: data_dir.join("videos"),
            results_dir: results_dir.into(),
            uploads_dir: uploads_dir.into(),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.voices_dir,
            &self.videos_dir,
            &self.results_dir,
            &self.uploads_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub async fn list_voices(&self) -> Result<Vec<String>> {
        Self::list(&self.voices_dir, VOICE_EXTENSIONS).await
    }

    pub async fn list_videos(&self) -> Result<Vec<String>> {
        Self::list(&self.videos_dir, VIDEO_EXTENSIONS).await
    }

    pub async fn list_results(&self) -> Result<Vec<String>> {
        Self::list(&self.results_dir, RESULT_EXTENSIONS).await
    }

    /// Name-sorted file names with one of the given extensions. A missing
    /// directory lists as empty; unreadable names are skipped.
    async fn list(dir: &Path, extensions: &[&str]) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if has_extension(name, extensions) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write generated audio into the voices library as `<unix_ms>.mp3`
    pub async fn save_voice(&self, audio: &[u8]) -> Result<String> {
        let filename = format!("{}.mp3", now_ms());
        let path = self.voices_dir.join(&filename);
        tokio::fs::write(&path, audio)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(filename)
    }

    /// Write generated audio into the uploads scratch space (combined flow)
    pub async fn save_upload_audio(&self, audio: &[u8]) -> Result<PathBuf> {
        let path = self.uploads_dir.join(format!("{}.mp3", now_ms()));
        tokio::fs::write(&path, audio)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Allocate a library slot for an uploaded video. The client name is
    /// sanitized and prefixed with a timestamp so repeat uploads never
    /// collide. Returns (filename, full path); the caller streams the body.
    pub fn new_video_path(&self, original_name: &str) -> Result<(String, PathBuf)> {
        Self::allocate_upload(&self.videos_dir, original_name)
    }

    /// Same, but into the uploads scratch space (combined flow)
    pub fn new_upload_video_path(&self, original_name: &str) -> Result<(String, PathBuf)> {
        Self::allocate_upload(&self.uploads_dir, original_name)
    }

    fn allocate_upload(dir: &Path, original_name: &str) -> Result<(String, PathBuf)> {
        let clean = sanitize_filename::sanitize(original_name);
        if clean.is_empty() {
            bail!("unusable file name '{original_name}'");
        }
        if !has_extension(&clean, VIDEO_EXTENSIONS) {
            bail!(
                "unsupported video type '{}', expected one of: {}",
                clean,
                VIDEO_EXTENSIONS.join(", ")
            );
        }
        let filename = format!("{}_{}", now_ms(), clean);
        let path = dir.join(&filename);
        Ok((filename, path))
    }

    /// Fresh `output_<unix_ms>.mp4` in results
    pub fn output_path(&self) -> PathBuf {
        self.results_dir.join(format!("output_{}.mp4", now_ms()))
    }

    /// Fresh log file path in the uploads scratch space
    pub fn job_log_path(&self) -> PathBuf {
        self.uploads_dir.join(format!("job_{}.log", now_ms()))
    }

    // ========================================================================
    // Name resolution
    // ========================================================================

    /// Map a client-supplied voice file name to its path on disk
    pub async fn resolve_voice(&self, name: &str) -> Result<PathBuf> {
        Self::resolve(&self.voices_dir, name, "voice").await
    }

    /// Map a client-supplied video file name to its path on disk
    pub async fn resolve_video(&self, name: &str) -> Result<PathBuf> {
        Self::resolve(&self.videos_dir, name, "video").await
    }

    async fn resolve(dir: &Path, name: &str, what: &str) -> Result<PathBuf> {
        // Plain basenames only; anything with separators or dot segments
        // would escape the library directory.
        if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
            bail!("invalid {what} file name '{name}'");
        }
        let path = dir.join(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            bail!("{what} '{name}' not found");
        }
        Ok(path)
    }
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
