//! Per-context append-only event log (`events.jsonl`).
//!
//! The log is the single source of truth. Lines are never rewritten or
//! removed. Reading is forgiving: a line that does not decode is skipped
//! with a warning and parsing continues, so a crash that truncated the
//! last line (or a stray manual edit) never hides the events around it.

use crate::atomic::AtomicWriter;
use crate::error::Result;
use crate::event::{DecodeError, Event, EventKind};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the event log inside a context directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Counters from a log read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogReadStats {
    /// Non-blank lines seen.
    pub lines: usize,
    /// Lines decoded into events.
    pub events: usize,
    /// Lines that were not valid JSON objects.
    pub corrupt: usize,
    /// Objects with an unknown type or missing fields.
    pub unrecognized: usize,
    /// Whether the file needed a lossy UTF-8 decode.
    pub lossy: bool,
    /// Length of the file as read.
    pub bytes: u64,
}

/// Handle on one context's event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Opens the log inside `context_dir`. Nothing is created until the first append.
    pub fn new(context_dir: impl AsRef<Path>) -> Self {
        Self {
            path: context_dir.as_ref().join(EVENTS_FILE),
        }
    }

    /// Path of the `events.jsonl` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any event has ever been appended.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Stamps `kind` with `timestamp` and appends it as one line.
    ///
    /// If a previous crash left an unterminated last line, the writer starts
    /// the new event on a line of its own.
    pub fn append(&self, writer: &AtomicWriter, kind: EventKind, timestamp: String) -> Result<Event> {
        self.append_sized(writer, kind, timestamp).map(|(event, _)| event)
    }

    /// Like [`append`](Self::append), also returning how many bytes the log
    /// grew by.
    pub fn append_sized(
        &self,
        writer: &AtomicWriter,
        kind: EventKind,
        timestamp: String,
    ) -> Result<(Event, u64)> {
        let event = Event::new(timestamp, kind);
        let line = event.to_line()?;
        let added = writer.append(&self.path, line.as_bytes())?;
        debug!(event = event.kind.name(), bytes = added, "appended event");
        Ok((event, added))
    }

    /// Reads every decodable event in append order.
    ///
    /// A missing log reads as empty.
    pub fn read(&self) -> Result<Vec<Event>> {
        Ok(self.read_with_stats()?.0)
    }

    /// Like [`read`](Self::read), also reporting what was skipped.
    pub fn read_with_stats(&self) -> Result<(Vec<Event>, LogReadStats)> {
        let mut stats = LogReadStats::default();

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), stats)),
            Err(e) => return Err(e.into()),
        };
        stats.bytes = bytes.len() as u64;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.path.display(), "event log is not valid UTF-8, decoding lossily");
                stats.lossy = true;
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        let mut events = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    warn!(path = %self.path.display(), line = idx + 1, error = %e, "skipping corrupt event line");
                    stats.corrupt += 1;
                    continue;
                }
            };

            match Event::from_value(value) {
                Ok(event) => events.push(event),
                Err(DecodeError::NotAnObject) => {
                    warn!(path = %self.path.display(), line = idx + 1, "skipping non-object event line");
                    stats.corrupt += 1;
                }
                Err(reason) => {
                    warn!(path = %self.path.display(), line = idx + 1, ?reason, "ignoring unrecognized event");
                    stats.unrecognized += 1;
                }
            }
        }

        stats.events = events.len();
        Ok((events, stats))
    }
}
