use std::sync::Arc;

use tokio::sync::Mutex;

use dubsync::{EventHub, MediaStore, SpeechSynthesizer, SyncRunner, VoiceMap};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MediaStore>,
    /// None when no API key is configured; generation endpoints answer 503
    pub tts: Option<Arc<dyn SpeechSynthesizer>>,
    pub voices: VoiceMap,
    pub runner: Arc<SyncRunner>,
    pub hub: EventHub,
    // Lock to ensure sequential processing of sync jobs
    // (the external tool owns the GPU; one run at a time)
    pub lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        store: MediaStore,
        tts: Option<Arc<dyn SpeechSynthesizer>>,
        voices: VoiceMap,
        runner: SyncRunner,
        hub: EventHub,
    ) -> Self {
        Self {
            store: Arc::new(store),
            tts,
            voices,
            runner: Arc::new(runner),
            hub,
            lock: Arc::new(Mutex::new(())),
        }
    }
}
