//! Speech synthesis
//!
//! The trait is the seam between the HTTP surface and the upstream speech
//! provider; handlers and tests never care which implementation is behind
//! the `Arc<dyn SpeechSynthesizer>`.

pub mod elevenlabs;

pub use elevenlabs::ElevenLabs;

use anyhow::Result;
use async_trait::async_trait;

/// Turn text into encoded audio. The bytes are an opaque MP3 passthrough;
/// nothing downstream decodes them.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}
