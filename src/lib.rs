//! Cohost - a voiced co-host that answers live chat
//!
//! This library provides the pieces of the co-host bot:
//! - Live chat ingestion (YouTube)
//! - Persona prompt building and answer sanitizing
//! - Text generation via an OpenAI-compatible completion API
//! - Speech rendering via VOICEVOX and ordered audio playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  YouTube live chat                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ chat events / stream errors
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Pipeline                         │
//! │  Staleness │ Persona │ Generation │ Sanitize │ TTS  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ reserved slots, arrival order
//! ┌────────────────────▼────────────────────────────────┐
//! │               Playback sequencer                     │
//! │          one clip at a time → output device          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod persona;
pub mod pipeline;
pub mod sanitize;
pub mod staleness;
pub mod transcript;
pub mod voice;

pub use chat::{ChatConnector, ChatEvent, Segment, StreamError, StreamEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use generation::{OpenAiCompletions, TextGenerator};
pub use persona::Persona;
pub use pipeline::{ChatOutcome, Pipeline, PipelineOptions};
pub use transcript::{FileTranscript, TranscriptEntry, TranscriptSink};
