//! ElevenLabs text-to-speech client

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::SpeechSynthesizer;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

// The API can take a while on long passages
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ElevenLabs {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabs {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (tests, proxies)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabs {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            bail!("text is empty");
        }

        let url = self.speech_url(voice_id);
        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("speech request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("speech API returned {status}: {body}");
        }

        let audio = response
            .bytes()
            .await
            .context("reading speech response body")?;
        Ok(audio.to_vec())
    }
}
