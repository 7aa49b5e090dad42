//! Spawn-and-tail runner for the external sync tool
//!
//! The tool is started as `<command> <video> <audio> <output>` with both
//! output streams redirected into a per-job log file. A fixed-interval
//! timer reads whatever the file gained since the last poll and forwards
//! each complete line to the event hub; the timer dies with the process.
//! Every run ends in exactly one terminal event: `result` when the exit
//! status is clean and the output file exists, `failed` otherwise.

use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::events::{EventHub, JobEvent};
use crate::job::SyncRequest;

pub struct SyncRunner {
    command: PathBuf,
    poll_interval: Duration,
    hub: EventHub,
}

impl SyncRunner {
    pub fn new(command: PathBuf, poll_interval: Duration, hub: EventHub) -> Self {
        Self {
            command,
            // interval() panics on a zero period
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            hub,
        }
    }

    /// Run one job to completion. Errors are also broadcast as a `failed`
    /// event so socket clients are never left hanging.
    pub async fn run(&self, request: SyncRequest) -> Result<()> {
        let log_file = tokio::fs::File::create(&request.log_path)
            .await
            .with_context(|| format!("creating {}", request.log_path.display()))?
            .into_std()
            .await;
        let log_file_err = log_file
            .try_clone()
            .context("cloning log handle for stderr")?;

        info!(
            command = %self.command.display(),
            video = %request.video.display(),
            audio = %request.audio.display(),
            output = %request.output.display(),
            "starting sync job"
        );

        let spawned = Command::new(&self.command)
            .arg(&request.video)
            .arg(&request.audio)
            .arg(&request.output)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("failed to start {}: {e}", self.command.display());
                self.hub.send(JobEvent::Failed(msg.clone()));
                bail!(msg);
            }
        };

        let mut tail = LogTail::new(request.log_path.clone());
        let mut ticker = tokio::time::interval(self.poll_interval);

        let status = loop {
            tokio::select! {
                exited = child.wait() => {
                    match exited {
                        Ok(status) => break status,
                        Err(e) => {
                            let msg = format!("failed waiting for sync tool: {e}");
                            self.hub.send(JobEvent::Failed(msg.clone()));
                            bail!(msg);
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.forward_new_lines(&mut tail).await;
                }
            }
        };

        // The process is gone; drain what it wrote after the last tick
        self.forward_new_lines(&mut tail).await;
        if let Some(rest) = tail.take_remainder() {
            self.hub.send(JobEvent::Log(rest));
        }

        if !status.success() {
            let msg = format!("sync tool exited with {status}");
            self.hub.send(JobEvent::Failed(msg.clone()));
            bail!(msg);
        }

        if !tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            let msg = format!(
                "sync tool exited cleanly but produced no output at {}",
                request.output.display()
            );
            self.hub.send(JobEvent::Failed(msg.clone()));
            bail!(msg);
        }

        info!(output = %request.output.display(), "sync job finished");
        self.hub
            .send(JobEvent::Progress("Video processing complete!".to_string()));
        self.hub.send(JobEvent::Result(request.output_name()));
        Ok(())
    }

    async fn forward_new_lines(&self, tail: &mut LogTail) {
        match tail.read_new().await {
            Ok(lines) => {
                for line in lines {
                    self.hub.send(JobEvent::Log(line));
                }
            }
            Err(e) => warn!("log poll failed: {e:#}"),
        }
    }
}

/// Byte-offset reader over the job log. Yields complete lines; a trailing
/// partial line is carried to the next poll. A file that shrank (rotation,
/// truncation) is re-read from the start.
struct LogTail {
    path: PathBuf,
    offset: u64,
    carry: String,
}

impl LogTail {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            carry: String::new(),
        }
    }

    async fn read_new(&mut self) -> Result<Vec<String>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("stat {}", self.path.display())),
        };

        let len = metadata.len();
        if len < self.offset {
            self.offset = 0;
            self.carry.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut buf = vec![0u8; (len - self.offset) as usize];
        file.read_exact(&mut buf).await?;
        self.offset = len;

        self.carry.push_str(&String::from_utf8_lossy(&buf));

        let mut lines = Vec::new();
        while let Some(newline) = self.carry.find('\n') {
            let line = self.carry[..newline].trim_end_matches('\r').to_string();
            self.carry.drain(..=newline);
            lines.push(line);
        }
        Ok(lines)
    }

    /// Whatever is buffered after the final newline
    fn take_remainder(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.carry))
        }
    }
}
