//! Live chat connector
//!
//! A connector turns a live stream's chat into a stream of [`StreamEvent`]s:
//! viewer messages and stream-level errors.

mod dedup;
mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub use dedup::MessageDedup;
pub use youtube::{LiveTarget, YouTubeLiveChat};

use crate::Result;

/// One piece of a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Text {
        /// Message text
        text: String,
    },
    /// Emoji, rendered as a textual placeholder
    Emoji {
        /// Placeholder text (shortcut or emoji character)
        text: String,
        /// Accessibility label, if the platform provides one
        alt: Option<String>,
    },
}

impl Segment {
    /// Create a text segment
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an emoji segment
    #[must_use]
    pub fn emoji(text: impl Into<String>) -> Self {
        Self::Emoji {
            text: text.into(),
            alt: None,
        }
    }

    /// Text this segment contributes to the flattened comment
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text { text } | Self::Emoji { text, .. } => text,
        }
    }
}

/// A viewer message from the live chat
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Platform message identifier
    pub id: String,

    /// Author display name
    pub author: String,

    /// When the message was posted
    pub received_at: DateTime<Utc>,

    /// Message body in order
    pub segments: Vec<Segment>,
}

impl ChatEvent {
    /// Create an event with the given timestamp and body
    #[must_use]
    pub fn new(received_at: DateTime<Utc>, segments: Vec<Segment>) -> Self {
        Self {
            id: String::new(),
            author: String::new(),
            received_at,
            segments,
        }
    }

    /// Flatten the segments into a single comment string
    #[must_use]
    pub fn comment_text(&self) -> String {
        self.segments.iter().map(Segment::display_text).collect()
    }
}

/// A stream-level failure reported by the connector
#[derive(Debug, Clone)]
pub struct StreamError {
    /// Human-readable message, if any
    pub message: Option<String>,
}

impl StreamError {
    /// Error with a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Event emitted by a chat connector
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A viewer message
    Chat(ChatEvent),
    /// A stream-level error; the connector keeps running
    Error(StreamError),
}

/// Source of live chat events
#[async_trait]
pub trait ChatConnector: Send {
    /// Connector name for logs
    fn name(&self) -> &'static str;

    /// Begin streaming
    ///
    /// The returned receiver yields events until the connector stops.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be started
    async fn start(&mut self) -> Result<mpsc::Receiver<StreamEvent>>;
}
