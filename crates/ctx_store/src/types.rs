//! Core data types for the context store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    /// Work is ongoing; the context lives in the active area.
    #[default]
    Active,
    /// Work is done; the context is (or is about to be) archived.
    Completed,
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Completed => "completed",
        })
    }
}

/// Current phase of work on a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InFlightMode {
    /// Nothing in progress.
    #[default]
    None,
    /// A plan is being drafted.
    Planning,
    /// A plan has been archived and awaits implementation.
    PendingImplementation,
    /// The archived plan is being implemented.
    Implementing,
    /// A handoff document was written; the next session should resume from it.
    HandoffPending,
}

impl InFlightMode {
    /// Returns the wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Planning => "planning",
            Self::PendingImplementation => "pending_implementation",
            Self::Implementing => "implementing",
            Self::HandoffPending => "handoff_pending",
        }
    }

    /// Whether the store may move a context from `self` to `target`.
    ///
    /// Replay never consults this: the log is applied as written.
    pub fn can_transition_to(&self, target: InFlightMode) -> bool {
        use InFlightMode::*;

        match (self, target) {
            (None, Planning) => true,
            (None | Planning | PendingImplementation, PendingImplementation) => true,
            (Planning | PendingImplementation, Implementing) => true,
            (None, None) => false,
            (_, None) => true,
            (None, HandoffPending) => false,
            (_, HandoffPending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InFlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient work phase owned by a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InFlightState {
    /// Current mode.
    pub mode: InFlightMode,
    /// Archived plan document, set in `pending_implementation`/`implementing`.
    pub artifact_path: Option<String>,
    /// BLAKE3 hex hash of the archived plan document.
    pub artifact_hash: Option<String>,
    /// When the current mode began.
    pub started_at: Option<String>,
    /// Host sessions bound to this context, in binding order, without duplicates.
    #[serde(default)]
    pub session_ids: Vec<String>,
    /// Handoff document, set in `handoff_pending`.
    pub handoff_path: Option<String>,
}

impl InFlightState {
    /// Binds a session id. Returns false if it was already bound.
    pub fn bind_session(&mut self, session_id: &str) -> bool {
        if self.session_ids.iter().any(|s| s == session_id) {
            return false;
        }
        self.session_ids.push(session_id.to_string());
        true
    }

    /// The mode a cleared handoff falls back to.
    pub fn mode_after_handoff(&self) -> InFlightMode {
        if self.artifact_path.is_some() {
            InFlightMode::Implementing
        } else {
            InFlightMode::None
        }
    }
}

/// A unit of tracked work.
///
/// Serialized as the `context.json` snapshot. `folder` is derived from
/// where the context currently lives on disk and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Context {
    /// Stable slug, immutable after creation.
    pub id: String,
    /// Lifecycle status.
    pub status: ContextStatus,
    /// Free-form description.
    pub summary: String,
    /// Workflow that produced this context.
    pub method: String,
    /// Unordered tags, kept sorted for stable output.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Timestamp of the `context_created` event.
    pub created_at: String,
    /// Timestamp of the most recent event.
    pub last_active: String,
    /// Transient work phase.
    #[serde(default)]
    pub in_flight: InFlightState,
    /// On-disk location; changes when archived.
    #[serde(skip)]
    pub folder: PathBuf,
}

impl Context {
    /// Whether the context has been completed.
    pub fn is_completed(&self) -> bool {
        self.status == ContextStatus::Completed
    }
}

/// Status of a task inside a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done, with evidence.
    Completed,
    /// Cannot proceed.
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        })
    }
}

/// A sub-unit of work, derived entirely from task events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Task {
    /// Caller-assigned id.
    pub id: String,
    /// Short imperative title.
    pub subject: String,
    /// Longer description.
    pub description: Option<String>,
    /// Present-continuous form shown while in progress.
    pub active_form: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Evidence recorded on completion.
    pub evidence: Option<String>,
    /// Summary of the work recorded on completion.
    pub work_summary: Option<String>,
    /// Files touched, recorded on completion.
    #[serde(default)]
    pub files_changed: Vec<String>,
    /// Why the task is blocked.
    pub blocked_reason: Option<String>,
}

impl Task {
    /// Tasks a handoff should carry forward.
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }
}

/// A free-form note attached to a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// When the note was appended.
    pub timestamp: String,
    /// Note text.
    pub content: String,
}
