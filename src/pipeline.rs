//! Response pipeline
//!
//! Reacts to each chat event independently:
//!
//! ```text
//! chat event ─▶ staleness filter ─▶ prompt ─▶ generation ─▶ sanitize ─▶ render ─▶ sequencer
//!                    │                                                     │
//!                 (stale: dropped)                              (render failed: dropped)
//! ```
//!
//! Playback slots are reserved when an event is admitted, so answers play in
//! the order comments arrived even when generations finish out of order.
//! Generation failures are turned into speech; only render and playback
//! failures, or an answer shed from a full playback queue, end in silence. Stream errors go to a side channel that only
//! updates the transcript.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::Result;
use crate::chat::{ChatConnector, ChatEvent, StreamError, StreamEvent};
use crate::generation::{GenerationRequest, GenerationResult, TextGenerator};
use crate::persona::Persona;
use crate::staleness::{STALENESS_THRESHOLD, is_stale_after};
use crate::transcript::{TranscriptEntry, TranscriptSink};
use crate::voice::{PlaybackSequencer, PlaybackSlot, SpeechRenderer};

/// Pipeline behavior toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Speak the viewer's question before the answer
    pub echo_question: bool,
    /// Comments older than this are not answered
    pub stale_after: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            echo_question: true,
            stale_after: STALENESS_THRESHOLD,
        }
    }
}

/// Terminal state of one chat event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Too old to answer; nothing was generated or queued
    Stale,
    /// The answer clip was handed to the sequencer
    Queued {
        /// Sanitized answer text
        answer: String,
    },
    /// The answer could not be rendered; nothing was queued for it
    RenderFailed {
        /// Sanitized answer text
        answer: String,
    },
    /// The answer was rendered but its place in the queue was already shed
    /// (overflow or shutdown)
    Dropped {
        /// Sanitized answer text
        answer: String,
    },
}

/// What became of one rendered text
enum Delivery {
    Filled,
    Shed,
    RenderFailed,
}

/// A fresh event with its playback slots reserved
struct Admitted {
    comment: String,
    author: String,
    echo_slot: Option<PlaybackSlot>,
    answer_slot: PlaybackSlot,
}

/// The chat response controller
#[derive(Clone)]
pub struct Pipeline {
    persona: Arc<Persona>,
    generator: Arc<dyn TextGenerator>,
    renderer: SpeechRenderer,
    sequencer: PlaybackSequencer,
    transcript: Arc<dyn TranscriptSink>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Wire the pipeline stages together
    #[must_use]
    pub fn new(
        persona: Persona,
        generator: Arc<dyn TextGenerator>,
        renderer: SpeechRenderer,
        sequencer: PlaybackSequencer,
        transcript: Arc<dyn TranscriptSink>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            persona: Arc::new(persona),
            generator,
            renderer,
            sequencer,
            transcript,
            options,
        }
    }

    /// The playback sequencer fed by this pipeline
    #[must_use]
    pub const fn sequencer(&self) -> &PlaybackSequencer {
        &self.sequencer
    }

    /// Consume `connector` until its stream ends or Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the connector cannot be started
    pub async fn run<C>(&self, connector: &mut C) -> Result<()>
    where
        C: ChatConnector + ?Sized,
    {
        self.run_until(connector, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Consume `connector` until its stream ends or `shutdown` completes
    ///
    /// Queued audio is played out before returning.
    ///
    /// # Errors
    ///
    /// Returns error if the connector cannot be started
    pub async fn run_until<C, F>(&self, connector: &mut C, shutdown: F) -> Result<()>
    where
        C: ChatConnector + ?Sized,
        F: Future<Output = ()>,
    {
        let mut events = connector.start().await?;
        tracing::info!(connector = connector.name(), "pipeline running");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(StreamEvent::Chat(event)) => {
                        self.dispatch(event);
                    }
                    Some(StreamEvent::Error(error)) => self.handle_stream_error(&error),
                    None => {
                        tracing::info!("chat stream ended");
                        break;
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        self.sequencer.shutdown().await;
        Ok(())
    }

    /// Admit `event` and answer it on a background task
    ///
    /// Admission (staleness check and slot reservation) happens before this
    /// returns, so calling order fixes playback order. Returns `None` for
    /// stale events.
    pub fn dispatch(&self, event: ChatEvent) -> Option<JoinHandle<ChatOutcome>> {
        let admitted = self.admit(event, Utc::now())?;
        let pipeline = self.clone();
        Some(tokio::spawn(async move { pipeline.respond(admitted).await }))
    }

    /// Admit and answer `event`, returning its outcome
    ///
    /// Playback is not awaited; the outcome reports whether the answer clip
    /// reached the sequencer.
    pub async fn handle_chat(&self, event: ChatEvent) -> ChatOutcome {
        match self.admit(event, Utc::now()) {
            Some(admitted) => self.respond(admitted).await,
            None => ChatOutcome::Stale,
        }
    }

    /// Side channel for stream-level errors
    ///
    /// Writes the error (or a fixed notice) to the answer transcript. The
    /// connector is responsible for its own recovery.
    pub fn handle_stream_error(&self, error: &StreamError) {
        tracing::warn!(error = ?error.message, "chat stream error");

        let text = error
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.persona.stream_error_fallback.clone());

        self.record_detached(TranscriptEntry::Answer, text);
    }

    fn admit(&self, event: ChatEvent, now: DateTime<Utc>) -> Option<Admitted> {
        let comment = event.comment_text();

        if is_stale_after(&event, now, self.options.stale_after) {
            tracing::info!(comment = %comment, author = %event.author, "skipping stale comment");
            return None;
        }

        let echo_slot = self
            .options
            .echo_question
            .then(|| self.sequencer.reserve(format!("question: {comment}")));
        let answer_slot = self.sequencer.reserve(format!("answer: {comment}"));

        Some(Admitted {
            comment,
            author: event.author,
            echo_slot,
            answer_slot,
        })
    }

    async fn respond(&self, admitted: Admitted) -> ChatOutcome {
        let Admitted {
            comment,
            author,
            echo_slot,
            answer_slot,
        } = admitted;

        tracing::debug!(comment = %comment, author = %author, "answering comment");
        self.record_detached(TranscriptEntry::Comment, comment.clone());

        let echo = async {
            if let Some(slot) = echo_slot {
                self.render_into(slot, &self.persona.echo_text(&comment)).await;
            }
        };
        let ((), result) = tokio::join!(echo, self.generate(&comment));

        let answer = self.persona.sanitize(&result.into_text());
        tracing::info!(comment = %comment, answer = %answer, "answer ready");
        self.record_detached(TranscriptEntry::Answer, answer.clone());

        match self.render_into(answer_slot, &answer).await {
            Delivery::Filled => ChatOutcome::Queued { answer },
            Delivery::Shed => ChatOutcome::Dropped { answer },
            Delivery::RenderFailed => ChatOutcome::RenderFailed { answer },
        }
    }

    /// One generation call; failures become the text to speak
    async fn generate(&self, comment: &str) -> GenerationResult {
        let request = GenerationRequest::new(self.persona.build_prompt(comment));

        match self.generator.generate(&request).await {
            Ok(text) => GenerationResult::Text(text),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, speaking the error");
                GenerationResult::Failed(e.detail())
            }
        }
    }

    /// Render `text` and fill `slot`; on failure the slot is abandoned
    async fn render_into(&self, slot: PlaybackSlot, text: &str) -> Delivery {
        match self.renderer.render(text).await {
            Ok(clip) => {
                let label = slot.label().to_string();
                if slot.fill(clip) {
                    Delivery::Filled
                } else {
                    tracing::warn!(label = %label, "playback slot was shed before the clip was ready");
                    Delivery::Shed
                }
            }
            Err(e) => {
                tracing::warn!(label = %slot.label(), error = %e, "render failed, skipping playback");
                Delivery::RenderFailed
            }
        }
    }

    /// Write a transcript record without blocking the pipeline
    fn record_detached(&self, entry: TranscriptEntry, text: String) {
        let transcript = Arc::clone(&self.transcript);
        tokio::spawn(async move {
            if let Err(e) = transcript.record(entry, &text).await {
                tracing::warn!(entry = entry.as_str(), error = %e, "transcript write failed");
            }
        });
    }
}
