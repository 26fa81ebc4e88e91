//! Configuration management for the co-host bot
//!
//! Settings are resolved once at startup with precedence
//! environment > TOML file > default. Missing required settings are a fatal
//! startup error.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::chat::LiveTarget;
use crate::generation::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::pipeline::PipelineOptions;
use crate::voice::{DEFAULT_MAX_PENDING, DEFAULT_SPEAKER_ID};
use crate::{Error, Persona, Result};

use file::{AudioFileConfig, CohostConfigFile, PersonaFileConfig};

/// Default chat poll interval
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Co-host configuration
#[derive(Debug)]
pub struct Config {
    /// Text generation backend
    pub generation: GenerationConfig,

    /// Live chat source
    pub chat: ChatConfig,

    /// Speech synthesis backend
    pub voice: VoiceConfig,

    /// Audio output
    pub audio: AudioConfig,

    /// Pipeline toggles
    pub pipeline: PipelineOptions,

    /// Directory for transcript files
    pub transcript_dir: PathBuf,

    /// Speaking persona
    pub persona: Persona,
}

/// Completion backend configuration
#[derive(Debug)]
pub struct GenerationConfig {
    /// `OpenAI` API key
    pub api_key: SecretString,

    /// Completion model
    pub model: String,

    /// API base URL
    pub base_url: String,
}

/// YouTube live chat configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Stream to follow
    pub target: LiveTarget,

    /// Delay between polls
    pub poll_interval: Duration,
}

/// VOICEVOX configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Engine URL
    pub endpoint: String,

    /// Speaker/style id
    pub speaker_id: u32,
}

/// Audio output configuration
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// Output device name; host default when `None`
    pub output_device: Option<String>,

    /// Bound on queued clips, 0 for unbounded
    pub max_pending: usize,
}

/// Environment variables read for a setting, first match wins
///
/// The camelCase names are what the `.env` of earlier deployments used.
const ENV_API_KEY: &[&str] = &["OPENAI_API_KEY", "apiKey"];
const ENV_CHANNEL_ID: &[&str] = &["YOUTUBE_CHANNEL_ID", "channelId"];
const ENV_LIVE_ID: &[&str] = &["YOUTUBE_LIVE_ID", "liveId"];
const ENV_VOICEVOX_ENDPOINT: &[&str] = &["VOICEVOX_ENDPOINT", "voicevoxEndpoint"];

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if required settings are missing or the file is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path)?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Load only the speech and audio output settings
    ///
    /// Used by commands that speak without following a chat.
    ///
    /// # Errors
    ///
    /// Returns error if the VOICEVOX endpoint is missing or the file is invalid
    pub fn load_output(config_path: Option<&Path>) -> Result<(VoiceConfig, AudioConfig)> {
        let fc = file::load_config_file(config_path)?;
        Self::output_from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve speech and audio output settings from a parsed file and an
    /// environment lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the VOICEVOX endpoint is missing
    pub fn output_from_sources<F>(
        fc: CohostConfigFile,
        env: F,
    ) -> Result<(VoiceConfig, AudioConfig)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = first_env(&env, ENV_VOICEVOX_ENDPOINT)
            .or_else(|| non_empty(fc.voice.endpoint))
            .ok_or_else(|| {
                Error::Config(
                    "missing required settings: VOICEVOX_ENDPOINT (voice.endpoint)".to_string(),
                )
            })?;

        Ok((
            voice_config(endpoint, fc.voice.speaker_id, &env)?,
            audio_config(fc.audio, &env),
        ))
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming every missing required setting, or if
    /// the persona preamble file cannot be read
    pub fn from_sources<F>(fc: CohostConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |names: &[&str]| first_env(&env, names);

        let api_key = lookup(ENV_API_KEY).or_else(|| non_empty(fc.generation.api_key));
        let channel_id = lookup(ENV_CHANNEL_ID).or_else(|| non_empty(fc.chat.channel_id));
        let live_id = lookup(ENV_LIVE_ID).or_else(|| non_empty(fc.chat.live_id));
        let endpoint = lookup(ENV_VOICEVOX_ENDPOINT).or_else(|| non_empty(fc.voice.endpoint));

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push("OPENAI_API_KEY (generation.api_key)");
        }
        if channel_id.is_none() && live_id.is_none() {
            missing.push("YOUTUBE_LIVE_ID or YOUTUBE_CHANNEL_ID (chat.live_id or chat.channel_id)");
        }
        if endpoint.is_none() {
            missing.push("VOICEVOX_ENDPOINT (voice.endpoint)");
        }

        // A live id pins the stream; a channel id follows whatever is live on it
        let target = live_id
            .map(LiveTarget::Video)
            .or_else(|| channel_id.map(LiveTarget::Channel));

        let (Some(api_key), Some(target), Some(endpoint)) = (api_key, target, endpoint) else {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        };

        let generation = GenerationConfig {
            api_key: SecretString::from(api_key),
            model: env("COHOST_LLM_MODEL")
                .or(fc.generation.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("COHOST_LLM_BASE_URL")
                .or(fc.generation.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let chat = ChatConfig {
            target,
            poll_interval: Duration::from_millis(
                fc.chat.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        };

        let voice = voice_config(endpoint, fc.voice.speaker_id, &env)?;
        let audio = audio_config(fc.audio, &env);

        let defaults = PipelineOptions::default();
        let pipeline = PipelineOptions {
            echo_question: fc.pipeline.echo_question.unwrap_or(defaults.echo_question),
            stale_after: fc
                .pipeline
                .stale_after_secs
                .map_or(defaults.stale_after, Duration::from_secs),
        };

        let transcript_dir = env("COHOST_TRANSCRIPT_DIR")
            .or(fc.transcript.dir)
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        let persona = Self::load_persona(fc.persona)?;

        Ok(Self {
            generation,
            chat,
            voice,
            audio,
            pipeline,
            transcript_dir,
            persona,
        })
    }

    /// Apply persona overrides on top of the built-in persona
    fn load_persona(overrides: PersonaFileConfig) -> Result<Persona> {
        let mut persona = Persona::zundamon();

        if let Some(path) = overrides.preamble_file {
            persona.preamble = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("cannot read persona preamble {path}: {e}"))
            })?;
            tracing::info!(path = %path, "loaded persona preamble");
        }

        if let Some(name) = overrides.name {
            persona.name = name;
        }
        if let Some(label) = overrides.viewer_label {
            persona.viewer_label = label;
        }
        if let Some(prefix) = overrides.question_prefix {
            persona.question_prefix = prefix;
        }
        if let Some(fallback) = overrides.fallback_answer {
            persona.fallback_answer = fallback;
        }
        if let Some(fallback) = overrides.stream_error_fallback {
            persona.stream_error_fallback = fallback;
        }

        Ok(persona)
    }
}

fn first_env<F>(env: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| env(name)).filter(|v| !v.trim().is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn voice_config<F>(endpoint: String, file_speaker: Option<u32>, env: &F) -> Result<VoiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let speaker_id = match env("VOICEVOX_SPEAKER") {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("VOICEVOX_SPEAKER is not a number: {raw}")))?,
        None => file_speaker.unwrap_or(DEFAULT_SPEAKER_ID),
    };

    Ok(VoiceConfig {
        endpoint,
        speaker_id,
    })
}

fn audio_config<F>(fc: AudioFileConfig, env: &F) -> AudioConfig
where
    F: Fn(&str) -> Option<String>,
{
    AudioConfig {
        output_device: env("COHOST_OUTPUT_DEVICE")
            .or(fc.output_device)
            .filter(|d| !d.is_empty()),
        max_pending: fc.max_pending.unwrap_or(DEFAULT_MAX_PENDING),
    }
}
