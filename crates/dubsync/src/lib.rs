pub mod events;
pub mod job;
pub mod store;
pub mod tts;
pub mod voice;

pub use events::{EventHub, JobEvent};
pub use job::{SyncRequest, SyncRunner};
pub use store::MediaStore;
pub use tts::{ElevenLabs, SpeechSynthesizer};
pub use voice::VoiceMap;
