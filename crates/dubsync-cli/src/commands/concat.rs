//! Concat command implementation
//!
//! Joins the clips in a directory with ffmpeg's concat demuxer, then
//! re-encodes with a 25 -> 30 fps retime. Clips are taken oldest first so
//! results stitch in the order they were produced.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{bail, Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tokio::process::Command;

#[derive(Parser, Debug)]
pub struct ConcatArgs {
    /// Directory containing the mp4 clips to join
    #[arg(default_value = "results")]
    pub dir: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "output_final.mp4")]
    pub output: PathBuf,

    /// Keep the concat list and the lossless intermediate
    #[arg(long)]
    pub keep_temp: bool,
}

pub async fn run(args: ConcatArgs) -> Result<()> {
    if which::which("ffmpeg").is_err() {
        bail!("ffmpeg not found in PATH");
    }

    let clips = sorted_clips(&args.dir)?;
    if clips.is_empty() {
        bail!("no mp4 files in {}", args.dir.display());
    }

    println!(
        "{} Joining {} clips from {}",
        "▶".cyan(),
        clips.len(),
        args.dir.display()
    );

    let list_path = args.dir.join("input.txt");
    tokio::fs::write(&list_path, concat_list(&clips)?)
        .await
        .with_context(|| format!("writing {}", list_path.display()))?;

    let temp_path = args.dir.join("temp_concat.mkv");

    // Pass 1: lossless concat of the parts
    run_ffmpeg(
        Command::new("ffmpeg")
            .arg("-y")
            .args(["-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&temp_path),
    )
    .await?;

    // Pass 2: retime 25 -> 30 fps, video re-encoded losslessly, audio copied
    run_ffmpeg(
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(&temp_path)
            .args(["-filter:v", "setpts=30/25*PTS"])
            .args(["-c:v", "libx264", "-preset", "slow", "-crf", "0"])
            .args(["-c:a", "copy"])
            .arg(&args.output),
    )
    .await?;

    if !args.keep_temp {
        let _ = tokio::fs::remove_file(&list_path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;
    }

    println!("  {} Wrote {}", "✓".green(), args.output.display());
    Ok(())
}

async fn run_ffmpeg(cmd: &mut Command) -> Result<()> {
    let status = cmd.status().await.context("running ffmpeg")?;
    if !status.success() {
        bail!("ffmpeg exited with {status}");
    }
    Ok(())
}

/// Concat demuxer list: one `file '<path>'` line per clip. Entries are
/// written absolute; ffmpeg resolves relative ones against the list file's
/// own directory, not the caller's. Single quotes inside a name close the
/// quote, escape it, and reopen.
fn concat_list(clips: &[PathBuf]) -> Result<String> {
    let mut list = String::new();
    for clip in clips {
        let clip = std::path::absolute(clip)
            .with_context(|| format!("resolving {}", clip.display()))?;
        let escaped = clip.display().to_string().replace('\'', r"'\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    Ok(list)
}

/// The directory's mp4 files, oldest modification first
fn sorted_clips(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    let mut clips = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_mp4 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
        if !is_mp4 {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        clips.push((modified, path));
    }

    clips.sort();
    Ok(clips.into_iter().map(|(_, path)| path).collect())
}
