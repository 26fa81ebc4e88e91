//! Error types for the co-host bot

use thiserror::Error;

/// Result type alias for co-host operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the co-host bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat connector error
    #[error("chat error: {0}")]
    Chat(String),

    /// Text generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Transcript write error
    #[error("transcript error: {0}")]
    Transcript(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// The bare message carried by this error, without the category prefix
    ///
    /// Used where the message itself is shown to viewers (a failed generation
    /// is spoken instead of the answer).
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Config(msg)
            | Self::Chat(msg)
            | Self::Generation(msg)
            | Self::Tts(msg)
            | Self::Audio(msg)
            | Self::Transcript(msg) => msg.clone(),
            Self::Io(e) => e.to_string(),
            Self::Http(e) => e.to_string(),
            Self::Serialization(e) => e.to_string(),
            Self::Toml(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_strips_category() {
        let err = Error::Generation("timeout".to_string());
        assert_eq!(err.to_string(), "generation error: timeout");
        assert_eq!(err.detail(), "timeout");
    }
}
