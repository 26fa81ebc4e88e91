//! Playback sequencer
//!
//! Owns the audio sink and plays clips one at a time in the order their slots
//! were reserved. A slot can be reserved before its clip exists, so a caller
//! claims its place in line when work starts and fills the slot when the
//! render finishes. Renders that finish out of order still play in order.
//!
//! The task at the head of the line may still be waiting for its clip. It
//! counts against the queue bound like any other unplayed task and is the
//! first to be shed when the bound is hit, so a render that never finishes
//! cannot hold up everything behind it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;

use super::{AudioClip, AudioSink};

/// Default bound on unplayed tasks
pub const DEFAULT_MAX_PENDING: usize = 16;

/// A queued playback entry
struct PlaybackTask {
    clip: oneshot::Receiver<AudioClip>,
    label: String,
    enqueued_at: Instant,
}

/// Queue state, guarded by one lock
#[derive(Default)]
struct QueueState {
    tasks: VecDeque<PlaybackTask>,
    /// The drain holds a task whose clip has not arrived
    head_waiting: bool,
    /// The waiting head was shed by an overflowing reservation
    shed_head: bool,
    closed: bool,
}

impl QueueState {
    fn pending(&self) -> usize {
        self.tasks.len() + usize::from(self.head_waiting)
    }
}

struct Shared {
    state: Mutex<QueueState>,
    /// Wakes the drain when a task is queued or the queue closes
    notify: Notify,
    /// Wakes the drain when its waiting head is shed
    shed: Notify,
    max_pending: usize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reserved place in the playback queue
///
/// Fill it with a clip, or drop it to give the place up; the sequencer skips
/// abandoned slots.
#[derive(Debug)]
pub struct PlaybackSlot {
    tx: oneshot::Sender<AudioClip>,
    label: String,
}

impl PlaybackSlot {
    /// Hand the clip to the sequencer
    ///
    /// Returns `false` if the slot was dropped from the queue in the meantime
    /// (queue overflow or shutdown).
    pub fn fill(self, clip: AudioClip) -> bool {
        if self.tx.send(clip).is_ok() {
            true
        } else {
            tracing::debug!(label = %self.label, "playback slot no longer queued");
            false
        }
    }

    /// Label given at reservation
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Serializes clips onto a single audio sink
#[derive(Clone)]
pub struct PlaybackSequencer {
    shared: Arc<Shared>,
    drain: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlaybackSequencer {
    /// Start a sequencer draining into `sink`
    ///
    /// `max_pending` bounds the unplayed tasks, including a head still
    /// waiting for its clip; when full, the oldest is dropped. `0` leaves the
    /// queue unbounded. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(sink: Arc<dyn AudioSink>, max_pending: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            shed: Notify::new(),
            max_pending,
        });

        let handle = tokio::spawn(drain(Arc::clone(&shared), sink));

        Self {
            shared,
            drain: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Reserve the next place in the queue
    ///
    /// Returns immediately; the clip plays after every earlier reservation has
    /// played or been dropped.
    #[must_use]
    pub fn reserve(&self, label: impl Into<String>) -> PlaybackSlot {
        let label = label.into();
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.shared.state();

            if state.closed {
                tracing::debug!(label = %label, "sequencer closed, slot not queued");
                return PlaybackSlot { tx, label };
            }

            if self.shared.max_pending > 0 && state.pending() >= self.shared.max_pending {
                if state.head_waiting {
                    state.head_waiting = false;
                    state.shed_head = true;
                    self.shared.shed.notify_one();
                    tracing::warn!(
                        queued = state.tasks.len(),
                        "playback queue full, dropping clip still being rendered"
                    );
                } else if let Some(dropped) = state.tasks.pop_front() {
                    tracing::warn!(
                        label = %dropped.label,
                        queued = state.tasks.len(),
                        "playback queue full, dropping oldest"
                    );
                }
            }

            state.tasks.push_back(PlaybackTask {
                clip: rx,
                label: label.clone(),
                enqueued_at: Instant::now(),
            });
        }

        self.shared.notify.notify_one();
        PlaybackSlot { tx, label }
    }

    /// Queue a finished clip for playback
    ///
    /// Returns `false` if the sequencer is shut down.
    pub fn enqueue(&self, clip: AudioClip) -> bool {
        let label = clip.text.clone();
        self.reserve(label).fill(clip)
    }

    /// Number of unplayed tasks, including a head waiting for its clip
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state().pending()
    }

    /// Whether nothing is waiting to play
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting reservations, play what is queued, and wait for the
    /// drain to finish
    pub async fn shutdown(&self) {
        self.shared.state().closed = true;
        self.shared.notify.notify_one();

        let handle = self
            .drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "playback drain task failed");
            }
        }
    }
}

/// Drain loop: one clip at a time, in queue order
async fn drain(shared: Arc<Shared>, sink: Arc<dyn AudioSink>) {
    loop {
        let next = {
            let mut state = shared.state();
            let task = state.tasks.pop_front();
            if task.is_some() {
                state.head_waiting = true;
                state.shed_head = false;
            } else if state.closed {
                break;
            }
            task
        };

        let Some(mut task) = next else {
            shared.notify.notified().await;
            continue;
        };

        let clip = loop {
            tokio::select! {
                biased;
                clip = &mut task.clip => break clip.ok(),
                () = shared.shed.notified() => {
                    if std::mem::take(&mut shared.state().shed_head) {
                        break None;
                    }
                }
            }
        };

        {
            let mut state = shared.state();
            state.head_waiting = false;
            state.shed_head = false;
        }

        let Some(clip) = clip else {
            tracing::debug!(label = %task.label, "playback slot abandoned");
            continue;
        };

        tracing::debug!(
            label = %task.label,
            waited_ms = task.enqueued_at.elapsed().as_millis(),
            "playing clip"
        );

        if let Err(e) = sink.play(clip).await {
            tracing::warn!(label = %task.label, error = %e, "playback failed, dropping clip");
        }
    }

    tracing::debug!("playback drain stopped");
}
