//! HTTP API server
//!
//! Axum-based server exposing the media libraries, the speech endpoints,
//! the sync-job endpoint, and the live event socket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use dubsync::{ElevenLabs, EventHub, MediaStore, SpeechSynthesizer, SyncRunner, VoiceMap};

use crate::commands::serve::{print_endpoints, ServeArgs};

pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws;

// Plenty for one chatty tool run; lagging clients skip ahead
const EVENT_CAPACITY: usize = 256;

pub async fn start_server(args: ServeArgs) -> Result<()> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let store = MediaStore::new(&args.data_dir, &args.results_dir, &args.uploads_dir);
    store.ensure_dirs().await?;

    let voices = match &args.voices {
        Some(spec) => VoiceMap::parse(spec)?,
        None => VoiceMap::default(),
    };
    if voices.is_empty() {
        warn!("no voices configured; set --voices or ELEVENLABS_VOICES (alias=id,...)");
    }

    let tts: Option<Arc<dyn SpeechSynthesizer>> = match args.api_key.as_deref() {
        Some(key) if !key.is_empty() => Some(Arc::new(ElevenLabs::new(key)?)),
        _ => {
            warn!("ELEVENLABS_API_KEY not set; speech generation endpoints disabled");
            None
        }
    };

    if !sync_command_available(&args) {
        warn!(
            command = %args.sync_command.display(),
            "sync command not found; process endpoints will fail until it exists"
        );
    }

    let hub = EventHub::new(EVENT_CAPACITY);
    let runner = SyncRunner::new(
        args.sync_command.clone(),
        Duration::from_millis(args.log_poll_ms),
        hub.clone(),
    );

    let state = state::AppState::new(store, tts, voices, runner, hub);
    let app = routes::create_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    print_endpoints(&args.host, args.port);
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Paths are checked on disk, bare names against PATH
fn sync_command_available(args: &ServeArgs) -> bool {
    if args.sync_command.components().count() > 1 {
        args.sync_command.exists()
    } else {
        which::which(&args.sync_command).is_ok()
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
