use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host to bind (default: 127.0.0.1)
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on (default: 3001)
    #[arg(long, default_value_t = 3001)]
    pub port: u16,

    /// Directory holding the voices/ and videos/ libraries
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory finished videos are written to
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Scratch directory for combined-flow uploads and job logs
    #[arg(long, default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// ElevenLabs API key; generation endpoints are disabled without it
    #[arg(long, env = "ELEVENLABS_API_KEY")]
    pub api_key: Option<String>,

    /// Voice aliases as alias=id pairs, comma separated
    #[arg(long, env = "ELEVENLABS_VOICES")]
    pub voices: Option<String>,

    /// Lip-sync tool, invoked as <command> <video> <audio> <output>
    #[arg(long, env = "SYNC_COMMAND", default_value = "./run_latentsync.sh")]
    pub sync_command: PathBuf,

    /// Log poll interval in milliseconds (minimum 1)
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub log_poll_ms: u64,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    crate::server::start_server(args).await
}

pub fn print_endpoints(host: &str, port: u16) {
    println!("\n{} dubsync server on http://{}:{}\n", "▶".cyan(), host, port);
    println!("  GET  /health");
    println!("  GET  /api/voices | /api/videos | /api/results");
    println!("  POST /api/generate-voice   json: text, voice");
    println!("  POST /api/upload-video     multipart: video");
    println!("  POST /api/process-video    json: voiceFile, videoFile");
    println!("  POST /api/process          multipart: video, text, voice");
    println!("  WS   /ws                   job events");
    println!("  GET  /data/voices/* | /data/videos/* | /results/*");
    println!();
}
