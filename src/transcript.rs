//! Operator transcript
//!
//! The latest comment and the latest answer are written to plain text files
//! so a streaming overlay (e.g. an OBS text source) can show them. Files are
//! overwritten on every write and never read back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{Error, Result};

/// File holding the latest comment
pub const COMMENT_FILE: &str = "comment.txt";

/// File holding the latest answer
pub const ANSWER_FILE: &str = "answer.txt";

/// Which record to overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriptEntry {
    /// The viewer comment being answered
    Comment,
    /// The spoken answer (or an error notice)
    Answer,
}

impl TranscriptEntry {
    /// Stable name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Answer => "answer",
        }
    }
}

/// Destination for transcript records
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Overwrite the record for `entry` with `text`
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written
    async fn record(&self, entry: TranscriptEntry, text: &str) -> Result<()>;
}

/// Writes `comment.txt` and `answer.txt` into a directory
#[derive(Debug, Clone)]
pub struct FileTranscript {
    dir: PathBuf,
}

impl FileTranscript {
    /// Write transcript files into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `entry`
    #[must_use]
    pub fn path(&self, entry: TranscriptEntry) -> PathBuf {
        let name = match entry {
            TranscriptEntry::Comment => COMMENT_FILE,
            TranscriptEntry::Answer => ANSWER_FILE,
        };
        self.dir.join(name)
    }

    /// Directory holding the transcript files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TranscriptSink for FileTranscript {
    async fn record(&self, entry: TranscriptEntry, text: &str) -> Result<()> {
        let path = self.path(entry);
        tokio::fs::write(&path, text).await.map_err(|e| {
            Error::Transcript(format!("failed to write {}: {e}", path.display()))
        })
    }
}
