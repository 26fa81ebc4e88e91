//! VOICEVOX engine client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::SpeechSynthesizer;
use crate::{Error, Result};

/// Default VOICEVOX speaker (ずんだもん, normal style)
pub const DEFAULT_SPEAKER_ID: u32 = 1;

/// Upper bound on each engine call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a VOICEVOX engine
pub struct VoicevoxClient {
    client: Client,
    endpoint: String,
}

impl VoicevoxClient {
    /// Create a client for the engine at `endpoint` (e.g. `http://localhost:50021`)
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is empty or the HTTP client cannot be built
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(Error::Config("VOICEVOX endpoint required".to_string()));
        }

        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            endpoint: endpoint.to_string(),
        })
    }

    /// Engine base URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn audio_query(&self, text: &str, speaker: u32) -> Result<serde_json::Value> {
        let speaker = speaker.to_string();
        let response = self
            .client
            .post(format!("{}/audio_query", self.endpoint))
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("VOICEVOX audio_query error {status}: {body}")));
        }

        let query: serde_json::Value = response.json().await?;
        if !query.is_object() {
            return Err(Error::Tts("VOICEVOX returned a malformed audio query".to_string()));
        }

        Ok(query)
    }

    async fn synthesize(&self, query: &serde_json::Value, speaker: u32) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{}/synthesis", self.endpoint))
            .query(&[("speaker", speaker)])
            .json(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("VOICEVOX synthesis error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
