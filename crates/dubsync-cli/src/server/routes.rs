//! API routes configuration

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::server::state::AppState;
use crate::server::ws;

/// Uploaded source clips can be large; the stock 2 MB body cap is far too small.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    // CORS layer for the browser front end
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Library listings
        .route("/api/voices", get(handlers::list_voices))
        .route("/api/videos", get(handlers::list_videos))
        .route("/api/results", get(handlers::list_results))
        // Speech generation and upload
        .route("/api/generate-voice", post(handlers::generate_voice))
        .route("/api/upload-video", post(handlers::upload_video))
        // Sync jobs
        .route("/api/process-video", post(handlers::process_video))
        .route("/api/process", post(handlers::process))
        // Live job events
        .route("/ws", get(ws::ws_handler))
        // Direct file access
        .nest_service("/data/voices", ServeDir::new(state.store.voices_dir()))
        .nest_service("/data/videos", ServeDir::new(state.store.videos_dir()))
        .nest_service("/results", ServeDir::new(state.store.results_dir()))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
