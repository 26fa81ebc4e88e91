//! TOML configuration file loading
//!
//! Supports `~/.config/cohost/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CohostConfigFile {
    /// Text generation backend
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Live chat source
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Speech synthesis backend
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Audio output
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Response pipeline toggles
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// Operator transcript output
    #[serde(default)]
    pub transcript: TranscriptFileConfig,

    /// Persona overrides
    #[serde(default)]
    pub persona: PersonaFileConfig,
}

/// Completion backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// `OpenAI` API key
    pub api_key: Option<String>,

    /// Completion model (e.g. "gpt-3.5-turbo-instruct")
    pub model: Option<String>,

    /// API base URL for OpenAI-compatible servers
    pub base_url: Option<String>,
}

/// YouTube live chat configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Channel id (`UC...`)
    pub channel_id: Option<String>,

    /// Live video id
    pub live_id: Option<String>,

    /// Delay between chat polls in milliseconds
    pub poll_interval_ms: Option<u64>,
}

/// VOICEVOX configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Engine URL (e.g. `http://localhost:50021`)
    pub endpoint: Option<String>,

    /// Speaker/style id
    pub speaker_id: Option<u32>,
}

/// Audio output configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Output device name (e.g. "CABLE Output (VB-Audio Point)")
    pub output_device: Option<String>,

    /// Bound on queued clips, 0 for unbounded
    pub max_pending: Option<usize>,
}

/// Pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// Speak the question before the answer
    pub echo_question: Option<bool>,

    /// Comments older than this many seconds are skipped
    pub stale_after_secs: Option<u64>,
}

/// Transcript configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranscriptFileConfig {
    /// Directory for `comment.txt` and `answer.txt`
    pub dir: Option<String>,
}

/// Persona overrides
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    /// Speaker tag stripped from generated answers (e.g. "ずんだもん")
    pub name: Option<String>,

    /// Label for the viewer's turn in the prompt
    pub viewer_label: Option<String>,

    /// Spoken before the viewer's comment (e.g. "質問、")
    pub question_prefix: Option<String>,

    /// Spoken when generation yields no usable text
    pub fallback_answer: Option<String>,

    /// Written to the answer transcript for a stream error without a message
    pub stream_error_fallback: Option<String>,

    /// File whose contents replace the built-in preamble
    pub preamble_file: Option<String>,
}

/// Load the TOML config file
///
/// With an explicit `path` the file must exist and parse. Without one, the
/// standard path is tried and `CohostConfigFile::default()` is returned if the
/// file doesn't exist or can't be parsed.
///
/// # Errors
///
/// Returns error if an explicitly given file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<CohostConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(CohostConfigFile::default());
    };

    if !path.exists() {
        return Ok(CohostConfigFile::default());
    }

    Ok(match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CohostConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CohostConfigFile::default()
        }
    })
}

/// Return the config file path: `~/.config/cohost/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cohost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let toml = r#"
            [chat]
            live_id = "abc"

            [audio]
            output_device = "CABLE Output (VB-Audio Point)"
            max_pending = 4

            [pipeline]
            echo_question = false
        "#;

        let config: CohostConfigFile = toml::from_str(toml).unwrap();

        assert_eq!(config.chat.live_id.as_deref(), Some("abc"));
        assert!(config.chat.channel_id.is_none());
        assert_eq!(
            config.audio.output_device.as_deref(),
            Some("CABLE Output (VB-Audio Point)")
        );
        assert_eq!(config.audio.max_pending, Some(4));
        assert_eq!(config.pipeline.echo_question, Some(false));
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let config: CohostConfigFile = toml::from_str("").unwrap();
        assert!(config.voice.endpoint.is_none());
        assert!(config.persona.name.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn explicit_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chat\nlive_id = ").unwrap();

        assert!(matches!(load_config_file(Some(&path)), Err(Error::Toml(_))));
    }
}
