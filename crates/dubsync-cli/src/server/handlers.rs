//! HTTP request handlers

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use dubsync::{JobEvent, SyncRequest};

use crate::server::state::AppState;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn internal_error(err: anyhow::Error) -> Response {
    tracing::error!("request failed: {err:#}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Library listings
// ============================================================================

#[derive(Serialize)]
pub struct VoicesResponse {
    voices: Vec<String>,
}

#[derive(Serialize)]
pub struct VideosResponse {
    videos: Vec<String>,
}

#[derive(Serialize)]
pub struct ResultsResponse {
    results: Vec<String>,
}

pub async fn list_voices(State(state): State<AppState>) -> Response {
    match state.store.list_voices().await {
        Ok(files) => Json(VoicesResponse {
            voices: files
                .into_iter()
                .map(|f| format!("/data/voices/{f}"))
                .collect(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn list_videos(State(state): State<AppState>) -> Response {
    match state.store.list_videos().await {
        Ok(files) => Json(VideosResponse {
            videos: files
                .into_iter()
                .map(|f| format!("/data/videos/{f}"))
                .collect(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn list_results(State(state): State<AppState>) -> Response {
    match state.store.list_results().await {
        Ok(files) => Json(ResultsResponse {
            results: files.into_iter().map(|f| format!("/results/{f}")).collect(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Speech generation
// ============================================================================

#[derive(Deserialize)]
pub struct GenerateVoiceRequest {
    text: String,
    voice: String,
}

#[derive(Serialize)]
pub struct FilenameResponse {
    filename: String,
}

pub async fn generate_voice(
    State(state): State<AppState>,
    Json(payload): Json<GenerateVoiceRequest>,
) -> Response {
    if payload.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "text is empty");
    }

    let Some(tts) = state.tts.clone() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "speech API key not configured",
        );
    };

    let voice_id = match state.voices.resolve(&payload.voice) {
        Ok(id) => id.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
    };

    let audio = match tts.synthesize(&payload.text, &voice_id).await {
        Ok(audio) => audio,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, format!("{e:#}")),
    };

    match state.store.save_voice(&audio).await {
        Ok(filename) => Json(FilenameResponse { filename }).into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Video upload
// ============================================================================

pub async fn upload_video(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("video") {
            continue;
        }

        let original = field.file_name().unwrap_or("upload.mp4").to_string();
        let (filename, path) = match state.store.new_video_path(&original) {
            Ok(slot) => slot,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
        };

        return match write_field_to(&path, field).await {
            Ok(()) => Json(FilenameResponse { filename }).into_response(),
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                error_response(StatusCode::BAD_REQUEST, format!("upload failed: {e:#}"))
            }
        };
    }

    error_response(StatusCode::BAD_REQUEST, "missing 'video' field")
}

async fn write_field_to(
    path: &Path,
    mut field: axum::extract::multipart::Field<'_>,
) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    while let Some(chunk) = field.chunk().await.context("reading upload stream")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }

    file.flush().await?;
    Ok(())
}

// ============================================================================
// Sync jobs
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoRequest {
    voice_file: String,
    video_file: String,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    success: bool,
    output: String,
}

pub async fn process_video(
    State(state): State<AppState>,
    Json(payload): Json<ProcessVideoRequest>,
) -> Response {
    let audio = match state.store.resolve_voice(&payload.voice_file).await {
        Ok(path) => path,
        Err(e) => return error_response(StatusCode::NOT_FOUND, format!("{e:#}")),
    };
    let video = match state.store.resolve_video(&payload.video_file).await {
        Ok(path) => path,
        Err(e) => return error_response(StatusCode::NOT_FOUND, format!("{e:#}")),
    };

    let output_name = queue_job(&state, video, audio);
    Json(ProcessResponse {
        success: true,
        output: output_name,
    })
    .into_response()
}

/// Hand a resolved pair to the runner. Jobs wait on the state lock so only
/// one sync tool instance runs at a time; the caller gets the output name
/// right away and everything else arrives over the event socket.
fn queue_job(state: &AppState, video: PathBuf, audio: PathBuf) -> String {
    let request = SyncRequest {
        video,
        audio,
        output: state.store.output_path(),
        log_path: state.store.job_log_path(),
    };
    let output_name = request.output_name();

    let runner = state.runner.clone();
    let lock = state.lock.clone();
    tokio::spawn(async move {
        let _guard = lock.lock().await;
        if let Err(e) = runner.run(request).await {
            tracing::error!("sync job failed: {e:#}");
        }
    });

    output_name
}

// ============================================================================
// Combined flow (upload + speech + sync in one call)
// ============================================================================

#[derive(Serialize)]
pub struct SuccessResponse {
    success: bool,
}

pub async fn process(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut video_path: Option<PathBuf> = None;
    let mut text: Option<String> = None;
    let mut voice: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => {
                let original = field.file_name().unwrap_or("upload.mp4").to_string();
                let (_, path) = match state.store.new_upload_video_path(&original) {
                    Ok(slot) => slot,
                    Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
                };
                if let Err(e) = write_field_to(&path, field).await {
                    let _ = tokio::fs::remove_file(&path).await;
                    return error_response(StatusCode::BAD_REQUEST, format!("upload failed: {e:#}"));
                }
                video_path = Some(path);
            }
            "text" => text = field.text().await.ok(),
            "voice" => voice = field.text().await.ok(),
            _ => {}
        }
    }

    let Some(video) = video_path else {
        return error_response(StatusCode::BAD_REQUEST, "missing 'video' field");
    };
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return error_response(StatusCode::BAD_REQUEST, "missing 'text' field"),
    };
    let Some(voice) = voice else {
        return error_response(StatusCode::BAD_REQUEST, "missing 'voice' field");
    };

    let Some(tts) = state.tts.clone() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "speech API key not configured",
        );
    };
    let voice_id = match state.voices.resolve(&voice) {
        Ok(id) => id.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
    };

    state
        .hub
        .send(JobEvent::Progress("Generating audio...".to_string()));

    let audio_bytes = match tts.synthesize(&text, &voice_id).await {
        Ok(audio) => audio,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, format!("{e:#}")),
    };
    let audio = match state.store.save_upload_audio(&audio_bytes).await {
        Ok(path) => path,
        Err(e) => return internal_error(e),
    };

    state.hub.send(JobEvent::Progress(
        "Audio generated, starting video processing...".to_string(),
    ));

    queue_job(&state, video, audio);
    Json(SuccessResponse { success: true }).into_response()
}
