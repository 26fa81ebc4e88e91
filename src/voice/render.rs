//! Speech render stage

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Error, Result};

/// Rendered speech ready for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Text the clip was rendered from
    pub text: String,
    /// Encoded audio (WAV)
    pub data: Vec<u8>,
}

impl AudioClip {
    /// Create a clip
    #[must_use]
    pub const fn new(text: String, data: Vec<u8>) -> Self {
        Self { text, data }
    }
}

/// Two-phase speech synthesis backend
///
/// The first call turns text into an utterance descriptor (an "audio query"),
/// the second turns the descriptor into waveform bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Build an utterance descriptor for `text`
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn audio_query(&self, text: &str, speaker: u32) -> Result<serde_json::Value>;

    /// Synthesize waveform bytes from a descriptor
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn synthesize(&self, query: &serde_json::Value, speaker: u32) -> Result<Vec<u8>>;
}

/// Audio output device
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a clip to completion
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be decoded or played
    async fn play(&self, clip: AudioClip) -> Result<()>;
}

/// Converts text to audio clips with a fixed voice
#[derive(Clone)]
pub struct SpeechRenderer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    speaker: u32,
}

impl SpeechRenderer {
    /// Create a renderer speaking with `speaker`
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, speaker: u32) -> Self {
        Self {
            synthesizer,
            speaker,
        }
    }

    /// Render `text` to a clip
    ///
    /// No retry and no placeholder audio: a failure is returned to the caller,
    /// which decides whether to skip playback.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if either synthesis phase fails or yields no audio
    pub async fn render(&self, text: &str) -> Result<AudioClip> {
        let query = self
            .synthesizer
            .audio_query(text, self.speaker)
            .await
            .map_err(into_tts_error)?;

        let data = self
            .synthesizer
            .synthesize(&query, self.speaker)
            .await
            .map_err(into_tts_error)?;

        if data.is_empty() {
            return Err(Error::Tts("synthesis returned no audio".to_string()));
        }

        tracing::debug!(bytes = data.len(), "speech rendered");
        Ok(AudioClip::new(text.to_string(), data))
    }
}

fn into_tts_error(e: Error) -> Error {
    match e {
        Error::Tts(_) => e,
        other => Error::Tts(other.detail()),
    }
}
