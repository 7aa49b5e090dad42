//! dubsync CLI
//!
//! Pairs ElevenLabs speech with an external lip-sync tool behind a small
//! web service.

use anyhow::Result;
use clap::Parser;

use dubsync_cli::commands;

/// dubsync - generated speech, lip-synced video
#[derive(Parser)]
#[command(
    name = "dubsync",
    author,
    version,
    about = "dubsync - pair generated speech with lip-synced video",
    long_about = "A small studio service around the ElevenLabs speech API and an\n\
                  external lip-sync tool.\n\n\
                  Generate voice-overs, upload clips, run the sync tool on a pair,\n\
                  and watch its log live in the browser."
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the HTTP API + WebSocket server
    ///
    /// Serves the voice/video/result libraries, the speech generation and
    /// upload endpoints, the process endpoint that drives the sync tool,
    /// and a live event socket carrying the tool's log.
    Serve(commands::serve::ServeArgs),

    /// Concatenate finished clips with ffmpeg
    ///
    /// Joins every mp4 in a directory (oldest first) into one file and
    /// retimes the result from 25 to 30 fps.
    Concat(commands::concat::ConcatArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Serve(cmd_args) => commands::serve::run(cmd_args).await,
        Commands::Concat(cmd_args) => commands::concat::run(cmd_args).await,
    }
}
