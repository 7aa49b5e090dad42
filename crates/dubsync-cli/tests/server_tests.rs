use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use dubsync::{EventHub, JobEvent, MediaStore, SpeechSynthesizer, SyncRunner, VoiceMap};
use dubsync_cli::server::{routes, state::AppState};

const BOUNDARY: &str = "dubsync-test-boundary";

/// Fixed MP3-ish bytes; the store treats audio as opaque anyway
struct StaticSynth;

#[async_trait::async_trait]
impl SpeechSynthesizer for StaticSynth {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<Vec<u8>> {
        Ok(b"ID3 fake mp3 payload".to_vec())
    }
}

/// Stands in for an upstream that rejects every request
struct FailingSynth;

#[async_trait::async_trait]
impl SpeechSynthesizer for FailingSynth {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("speech API returned 401 Unauthorized: invalid key")
    }
}

async fn test_state(dir: &Path) -> AppState {
    test_state_with_command(dir, PathBuf::from("/bin/true")).await
}

async fn test_state_with_command(dir: &Path, command: PathBuf) -> AppState {
    let store = MediaStore::new(dir.join("data"), dir.join("results"), dir.join("uploads"));
    store.ensure_dirs().await.unwrap();

    let hub = EventHub::new(64);
    let runner = SyncRunner::new(command, Duration::from_millis(10), hub.clone());

    AppState::new(
        store,
        Some(Arc::new(StaticSynth)),
        VoiceMap::parse("voice1=abc123,voice2=def456").unwrap(),
        runner,
        hub,
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_multipart(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn video_field(filename: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"video\"; filename=\"{filename}\"\r\n\
         Content-Type: video/mp4\r\n\r\n\
         fake video bytes\r\n"
    )
}

fn text_field(name: &str, value: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
         {value}\r\n"
    )
}

fn close_multipart(mut body: String) -> String {
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<JobEvent>) -> JobEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event hub closed")
}

async fn wait_for_terminal(rx: &mut tokio::sync::broadcast::Receiver<JobEvent>) -> JobEvent {
    loop {
        match next_event(rx).await {
            event @ (JobEvent::Result(_) | JobEvent::Failed(_)) => return event,
            _ => {}
        }
    }
}

#[cfg(unix)]
fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake_sync.sh");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Serve the router on an ephemeral port for real-socket tests
async fn serve_app(app: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect_ws(addr: std::net::SocketAddr) -> WsClient {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket handshake");
    socket
}

/// The upgrade response races the server task's hub subscription, so resend
/// the event until the first frame lands.
async fn next_frame(hub: &EventHub, event: JobEvent, socket: &mut WsClient) -> Value {
    use futures::StreamExt;

    for _ in 0..100 {
        hub.send(event.clone());
        if let Ok(Some(Ok(msg))) =
            tokio::time::timeout(Duration::from_millis(50), socket.next()).await
        {
            let text = msg.into_text().unwrap();
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
    panic!("no websocket frame arrived");
}

// ============================================================================
// Health and listings
// ============================================================================

#[tokio::test]
async fn test_health_reports_version() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_listings_start_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    for (uri, key) in [
        ("/api/voices", "voices"),
        ("/api/videos", "videos"),
        ("/api/results", "results"),
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await[key], json!([]));
    }
}

// ============================================================================
// Speech generation
// ============================================================================

#[tokio::test]
async fn test_generate_voice_saves_and_lists_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path()).await;
    let app = routes::create_router(state.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/generate-voice",
            json!({"text": "Hello there", "voice": "voice1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let filename = body_json(response).await["filename"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(filename.ends_with(".mp3"));
    assert!(state.store.voices_dir().join(&filename).exists());

    let response = app.oneshot(get("/api/voices")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["voices"], json!([format!("/data/voices/{filename}")]));
}

#[tokio::test]
async fn test_generate_voice_rejects_unknown_alias() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let response = app
        .oneshot(post_json(
            "/api/generate-voice",
            json!({"text": "Hello", "voice": "voice9"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("voice9"));
}

#[tokio::test]
async fn test_generate_voice_rejects_empty_text() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let response = app
        .oneshot(post_json(
            "/api/generate-voice",
            json!({"text": "   ", "voice": "voice1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_voice_needs_an_api_key() {
    let tmp = tempfile::tempdir().unwrap();
    let mut state = test_state(tmp.path()).await;
    state.tts = None;
    let app = routes::create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/generate-voice",
            json!({"text": "Hello", "voice": "voice1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_generate_voice_maps_upstream_failure_to_502() {
    let tmp = tempfile::tempdir().unwrap();
    let mut state = test_state(tmp.path()).await;
    state.tts = Some(Arc::new(FailingSynth));
    let app = routes::create_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/generate-voice",
            json!({"text": "Hello", "voice": "voice1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("speech API"));

    // Nothing half-written lands in the library
    assert!(state.store.list_voices().await.unwrap().is_empty());
}

// ============================================================================
// Video upload
// ============================================================================

#[tokio::test]
async fn test_upload_video_stores_and_lists_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path()).await;
    let app = routes::create_router(state.clone());

    let body = close_multipart(video_field("my clip.mp4"));
    let response = app
        .clone()
        .oneshot(post_multipart("/api/upload-video", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let filename = body_json(response).await["filename"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(filename.ends_with("_my clip.mp4"));
    assert!(state.store.videos_dir().join(&filename).exists());

    let response = app.oneshot(get("/api/videos")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["videos"], json!([format!("/data/videos/{filename}")]));
}

#[tokio::test]
async fn test_upload_video_rejects_non_video_types() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let body = close_multipart(video_field("document.pdf"));
    let response = app
        .oneshot(post_multipart("/api/upload-video", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_video_requires_the_video_field() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let body = close_multipart(text_field("something", "else"));
    let response = app
        .oneshot(post_multipart("/api/upload-video", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Sync jobs
// ============================================================================

#[tokio::test]
async fn test_process_video_404s_on_unknown_files() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let response = app
        .oneshot(post_json(
            "/api/process-video",
            json!({"voiceFile": "ghost.mp3", "videoFile": "ghost.mp4"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_video_runs_the_tool_and_broadcasts() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_script(
        tmp.path(),
        "#!/bin/sh\necho \"syncing frames\"\ncp \"$1\" \"$3\"\n",
    );
    let state = test_state_with_command(tmp.path(), script).await;

    tokio::fs::write(state.store.videos_dir().join("clip.mp4"), b"v")
        .await
        .unwrap();
    tokio::fs::write(state.store.voices_dir().join("line.mp3"), b"a")
        .await
        .unwrap();

    let mut rx = state.hub.subscribe();
    let app = routes::create_router(state.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/process-video",
            json!({"voiceFile": "line.mp3", "videoFile": "clip.mp4"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    let output = body["output"].as_str().unwrap().to_string();
    assert!(output.starts_with("output_") && output.ends_with(".mp4"));

    match wait_for_terminal(&mut rx).await {
        JobEvent::Result(name) => assert_eq!(name, output),
        other => panic!("expected result event, got {other:?}"),
    }
    assert!(state.store.results_dir().join(&output).exists());

    let response = app.oneshot(get("/api/results")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["results"], json!([format!("/results/{output}")]));
}

#[cfg(unix)]
#[tokio::test]
async fn test_combined_process_generates_speech_then_syncs() {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_script(tmp.path(), "#!/bin/sh\ncp \"$1\" \"$3\"\n");
    let state = test_state_with_command(tmp.path(), script).await;

    let mut rx = state.hub.subscribe();
    let app = routes::create_router(state.clone());

    let mut body = video_field("clip.mp4");
    body.push_str(&text_field("text", "Hello from the combined flow"));
    body.push_str(&text_field("voice", "voice2"));
    let response = app
        .oneshot(post_multipart("/api/process", close_multipart(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], json!(true));

    assert_eq!(
        next_event(&mut rx).await,
        JobEvent::Progress("Generating audio...".to_string())
    );
    assert_eq!(
        next_event(&mut rx).await,
        JobEvent::Progress("Audio generated, starting video processing...".to_string())
    );
    assert!(matches!(
        wait_for_terminal(&mut rx).await,
        JobEvent::Result(_)
    ));
}

#[tokio::test]
async fn test_combined_process_requires_all_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let app = routes::create_router(test_state(tmp.path()).await);

    let body = close_multipart(text_field("text", "no video here"));
    let response = app
        .oneshot(post_multipart("/api/process", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_combined_process_maps_upstream_failure_to_502() {
    let tmp = tempfile::tempdir().unwrap();
    let mut state = test_state(tmp.path()).await;
    state.tts = Some(Arc::new(FailingSynth));
    let app = routes::create_router(state);

    let mut body = video_field("clip.mp4");
    body.push_str(&text_field("text", "Hello"));
    body.push_str(&text_field("voice", "voice1"));
    let response = app
        .oneshot(post_multipart("/api/process", close_multipart(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("speech API"));
}

// ============================================================================
// Live event socket
// ============================================================================

#[tokio::test]
async fn test_websocket_delivers_events_as_json_frames() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path()).await;
    let hub = state.hub.clone();
    let addr = serve_app(routes::create_router(state)).await;

    let mut socket = connect_ws(addr).await;
    let frame = next_frame(
        &hub,
        JobEvent::Progress("Generating audio...".to_string()),
        &mut socket,
    )
    .await;

    assert_eq!(
        frame,
        json!({"type": "progress", "data": "Generating audio..."})
    );
}

#[tokio::test]
async fn test_websocket_survives_a_dropped_client() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path()).await;
    let hub = state.hub.clone();
    let addr = serve_app(routes::create_router(state)).await;

    let first = connect_ws(addr).await;
    let mut second = connect_ws(addr).await;
    drop(first);

    let frame = next_frame(&hub, JobEvent::Log("still here".to_string()), &mut second).await;
    assert_eq!(frame, json!({"type": "log", "data": "still here"}));
}

// ============================================================================
// Static file access
// ============================================================================

#[tokio::test]
async fn test_results_are_served_directly() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path()).await;

    tokio::fs::write(state.store.results_dir().join("output_9.mp4"), b"movie")
        .await
        .unwrap();

    let app = routes::create_router(state);
    let response = app.oneshot(get("/results/output_9.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"movie");
}
