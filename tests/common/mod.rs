//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cohost::chat::{ChatConnector, ChatEvent, Segment, StreamEvent};
use cohost::generation::{GenerationRequest, TextGenerator};
use cohost::transcript::{TranscriptEntry, TranscriptSink};
use cohost::voice::{AudioClip, AudioSink, PlaybackSequencer, SpeechRenderer, SpeechSynthesizer};
use cohost::{Error, Persona, Pipeline, PipelineOptions, Result};
use tokio::sync::mpsc;

/// Text containing this marker fails to render or play
pub const FAIL_MARKER: &str = "RENDER_FAIL";

/// A fresh chat event with a single text segment
pub fn chat(text: &str) -> ChatEvent {
    let mut event = ChatEvent::new(Utc::now(), vec![Segment::text(text)]);
    event.author = "viewer".to_string();
    event
}

/// A chat event posted `age_secs` ago
pub fn chat_aged(text: &str, age_secs: i64) -> ChatEvent {
    let mut event = chat(text);
    event.received_at = Utc::now() - chrono::Duration::seconds(age_secs);
    event
}

/// Poll `condition` until it holds or a few seconds pass
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Scripted generator
///
/// Replies are matched by a substring of the prompt; unmatched prompts get
/// the default reply.
pub struct MockGenerator {
    replies: Vec<(String, Reply, Duration)>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(default_reply: &str) -> Self {
        Self {
            replies: Vec::new(),
            default_reply: default_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` when the prompt contains `key`
    pub fn reply(mut self, key: &str, text: &str) -> Self {
        self.replies
            .push((key.to_string(), Reply::Text(text.to_string()), Duration::ZERO));
        self
    }

    /// Reply with `text` after `delay` when the prompt contains `key`
    pub fn reply_after(mut self, key: &str, text: &str, delay: Duration) -> Self {
        self.replies
            .push((key.to_string(), Reply::Text(text.to_string()), delay));
        self
    }

    /// Fail with `message` when the prompt contains `key`
    pub fn fail(mut self, key: &str, message: &str) -> Self {
        self.replies
            .push((key.to_string(), Reply::Fail(message.to_string()), Duration::ZERO));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let scripted = self
            .replies
            .iter()
            .find(|(key, _, _)| request.prompt.contains(key.as_str()))
            .map(|(_, reply, delay)| (reply.clone(), *delay));

        let Some((reply, delay)) = scripted else {
            return Ok(self.default_reply.clone());
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(Error::Generation(message)),
        }
    }
}

/// Synthesizer whose "audio" is the UTF-8 text itself
#[derive(Default)]
pub struct MockSynth {
    rendered: Mutex<Vec<String>>,
}

impl MockSynth {
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynth {
    async fn audio_query(&self, text: &str, speaker: u32) -> Result<serde_json::Value> {
        if text.contains(FAIL_MARKER) {
            return Err(Error::Tts("engine rejected the text".to_string()));
        }
        Ok(serde_json::json!({ "text": text, "speaker": speaker }))
    }

    async fn synthesize(&self, query: &serde_json::Value, _speaker: u32) -> Result<Vec<u8>> {
        let text = query["text"].as_str().unwrap_or_default().to_string();
        self.rendered.lock().unwrap().push(text.clone());
        Ok(text.into_bytes())
    }
}

/// Sink that records what it plays and how many clips overlap
#[derive(Default)]
pub struct RecordingSink {
    played: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Duration,
}

impl RecordingSink {
    /// Each clip takes `delay` to play
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, clip: AudioClip) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        let text = String::from_utf8_lossy(&clip.data).into_owned();
        if text.contains(FAIL_MARKER) {
            return Err(Error::Audio("device unplugged".to_string()));
        }
        self.played.lock().unwrap().push(text);
        Ok(())
    }
}

/// Transcript that keeps every record in memory
#[derive(Default)]
pub struct RecordingTranscript {
    records: Mutex<Vec<(TranscriptEntry, String)>>,
    fail: bool,
}

impl RecordingTranscript {
    /// Every write fails, as with a missing or read-only directory
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<(TranscriptEntry, String)> {
        self.records.lock().unwrap().clone()
    }

    pub fn entries(&self, entry: TranscriptEntry) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(e, _)| *e == entry)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl TranscriptSink for RecordingTranscript {
    async fn record(&self, entry: TranscriptEntry, text: &str) -> Result<()> {
        self.records.lock().unwrap().push((entry, text.to_string()));
        if self.fail {
            return Err(Error::Transcript("permission denied".to_string()));
        }
        Ok(())
    }
}

/// Connector that replays a fixed list of events
pub struct MockConnector {
    events: Vec<StreamEvent>,
    hold_open: bool,
    fail_start: bool,
    keep_alive: Option<mpsc::Sender<StreamEvent>>,
}

impl MockConnector {
    /// Emit `events` then end the stream
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            hold_open: false,
            fail_start: false,
            keep_alive: None,
        }
    }

    /// Emit `events` and keep the stream open
    pub fn open(events: Vec<StreamEvent>) -> Self {
        Self {
            hold_open: true,
            ..Self::new(events)
        }
    }

    /// Fail to start
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl ChatConnector for MockConnector {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<StreamEvent>> {
        if self.fail_start {
            return Err(Error::Chat("live page returned 404".to_string()));
        }

        let (tx, rx) = mpsc::channel(self.events.len().max(1));
        for event in self.events.drain(..) {
            tx.try_send(event).unwrap();
        }

        if self.hold_open {
            self.keep_alive = Some(tx);
        }
        Ok(rx)
    }
}

/// A pipeline wired to mocks
pub struct Harness {
    pub pipeline: Pipeline,
    pub generator: Arc<MockGenerator>,
    pub synth: Arc<MockSynth>,
    pub sink: Arc<RecordingSink>,
    pub transcript: Arc<RecordingTranscript>,
}

impl Harness {
    /// Must be called inside a tokio runtime
    pub fn new(generator: MockGenerator, options: PipelineOptions) -> Self {
        Self::with_sink(generator, options, RecordingSink::default())
    }

    pub fn with_sink(
        generator: MockGenerator,
        options: PipelineOptions,
        sink: RecordingSink,
    ) -> Self {
        Self::build(generator, options, sink, RecordingTranscript::default(), 0)
    }

    /// Full control over the sink, transcript and playback queue bound
    pub fn build(
        generator: MockGenerator,
        options: PipelineOptions,
        sink: RecordingSink,
        transcript: RecordingTranscript,
        max_pending: usize,
    ) -> Self {
        let generator = Arc::new(generator);
        let synth = Arc::new(MockSynth::default());
        let sink = Arc::new(sink);
        let transcript = Arc::new(transcript);

        let pipeline = Pipeline::new(
            Persona::zundamon(),
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            SpeechRenderer::new(Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>, 1),
            PlaybackSequencer::new(Arc::clone(&sink) as Arc<dyn AudioSink>, max_pending),
            Arc::clone(&transcript) as Arc<dyn TranscriptSink>,
            options,
        );

        Self {
            pipeline,
            generator,
            synth,
            sink,
            transcript,
        }
    }

    /// Play out everything queued and stop the sequencer
    pub async fn flush(&self) {
        self.pipeline.sequencer().shutdown().await;
    }
}

/// Pipeline options with the echo leg switched off
pub fn answer_only() -> PipelineOptions {
    PipelineOptions {
        echo_question: false,
        ..PipelineOptions::default()
    }
}

/// Index of each string in `played`, panicking if absent
pub fn position(played: &[String], text: &str) -> usize {
    played
        .iter()
        .position(|p| p == text)
        .unwrap_or_else(|| panic!("{text:?} was not played: {played:?}"))
}
