//! Append-only structured log of failing model calls.
//!
//! One JSON record per line, one file per day
//! (`llm_errors_YYYY-MM-DD.jsonl`), opened with append semantics. Logging
//! must never destabilise the pipeline: write failures are dropped after a
//! debug line, and an empty directory path disables the log entirely.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::prompts::PromptKind;

/// Longest prompt/response excerpt kept in a record.
const MAX_EXCERPT_CHARS: usize = 5000;

/// A single failing call, as persisted to the JSONL log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_kind: Option<PromptKind>,
    /// Truncated prompt excerpt
    pub prompt: String,
    /// Truncated response excerpt
    pub response: String,
    pub message: String,
    /// Retry attempts observed by the writing site, 0 when unknown
    pub attempts: u32,
}

impl ErrorRecord {
    /// Build a record from an error at the moment of failure.
    pub fn from_error(
        error: &Error,
        prompt_kind: Option<PromptKind>,
        prompt: &str,
        response: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: error.kind(),
            prompt_kind,
            prompt: truncate_chars(prompt, MAX_EXCERPT_CHARS),
            response: truncate_chars(response, MAX_EXCERPT_CHARS),
            message: error.to_string(),
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

struct OpenLog {
    day: NaiveDate,
    file: File,
}

/// Append-only error log with daily file rotation.
pub struct ErrorLog {
    dir: Option<PathBuf>,
    state: Mutex<Option<OpenLog>>,
}

impl ErrorLog {
    /// Create a log writing under `dir`. An empty path disables logging:
    /// every record operation becomes a silent no-op.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir.to_path_buf())
        };
        Self {
            dir,
            state: Mutex::new(None),
        }
    }

    /// A log that drops every record.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            state: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Path of the file a record with `day` lands in, when enabled.
    pub fn file_for(&self, day: NaiveDate) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("llm_errors_{}.jsonl", day.format("%Y-%m-%d"))))
    }

    /// Append one record. Serialisation or I/O failures are dropped.
    pub fn record(&self, record: &ErrorRecord) {
        let Some(dir) = &self.dir else { return };

        let day = record.timestamp.date_naive();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let rotate = state.as_ref().map_or(true, |open| open.day != day);
        if rotate {
            match open_for(dir, day) {
                Ok(file) => *state = Some(OpenLog { day, file }),
                Err(error) => {
                    tracing::debug!(%error, "error log open failed, dropping record");
                    *state = None;
                    return;
                }
            }
        }

        let Some(open) = state.as_mut() else { return };
        match serde_json::to_string(record) {
            Ok(line) => {
                if let Err(error) = writeln!(open.file, "{line}") {
                    tracing::debug!(%error, "error log write failed, dropping record");
                }
            }
            Err(error) => {
                tracing::debug!(%error, "error record failed to serialise, dropping");
            }
        }
    }

}

fn open_for(dir: &Path, day: NaiveDate) -> std::io::Result<File> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("llm_errors_{}.jsonl", day.format("%Y-%m-%d")));
    OpenOptions::new().create(true).append(true).open(path)
}
