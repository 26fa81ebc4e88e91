//! Voice output
//!
//! Renders text to audio through a speech synthesis backend and plays it
//! through a single output device, one clip at a time.

mod playback;
mod render;
mod sequencer;
mod voicevox;

pub use playback::{CpalSink, list_output_devices};
pub use render::{AudioClip, AudioSink, SpeechRenderer, SpeechSynthesizer};
pub use sequencer::{DEFAULT_MAX_PENDING, PlaybackSequencer, PlaybackSlot};
pub use voicevox::{DEFAULT_SPEAKER_ID, VoicevoxClient};
