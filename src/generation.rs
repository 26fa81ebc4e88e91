//! Text generation backend
//!
//! The co-host talks to a prompt-completion endpoint: one request per chat
//! comment, no conversation history.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default completion model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Default OpenAI API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Upper bound on one completion call, including reading the body
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling configuration sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum generated tokens
    pub max_tokens: u32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Presence penalty
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt text
    pub prompt: String,
    /// Sampling configuration
    pub sampling: SamplingParams,
}

impl GenerationRequest {
    /// Request with the default sampling configuration
    #[must_use]
    pub fn new(prompt: String) -> Self {
        Self {
            prompt,
            sampling: SamplingParams::default(),
        }
    }
}

/// Outcome of a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// Generated text
    Text(String),
    /// The call failed; carries a human-readable message to speak instead
    Failed(String),
}

impl GenerationResult {
    /// Whether the call failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The generated text, or the failure message
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Failed(text) => text,
        }
    }
}

/// Prompt-completion backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the request
    ///
    /// Returns the raw generated text (possibly empty).
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// OpenAI-compatible `/completions` client
pub struct OpenAiCompletions {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiCompletions {
    /// Create a new completions client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new(api_key: SecretString, model: String, base_url: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for generation".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    sampling: SamplingParams,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl TextGenerator for OpenAiCompletions {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            prompt: &request.prompt,
            sampling: request.sampling,
        };

        let response = self
            .client
            .post(format!("{}/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map_or_else(|_| format!("{status}: {text}"), |b| b.error.message);
            return Err(Error::Generation(message));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .unwrap_or_default())
    }
}
