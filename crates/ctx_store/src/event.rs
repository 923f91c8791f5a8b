//! Typed events: the only durable record of a context.
//!
//! On disk each event is one JSON object per line,
//! `{"event": <type>, "timestamp": <ISO 8601>, ...fields}`. In memory the
//! payload is an [`EventKind`] variant wrapped in an [`Event`] envelope.

use crate::types::InFlightMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every event type the store writes or understands.
pub const EVENT_TYPES: &[&str] = &[
    "context_created",
    "context_completed",
    "context_reopened",
    "context_archived",
    "metadata_updated",
    "task_added",
    "task_started",
    "task_completed",
    "task_blocked",
    "note_added",
    "session_started",
    "planning_started",
    "plan_created",
    "plan_implementation_started",
    "plan_completed",
    "handoff_created",
    "handoff_cleared",
];

/// Type-specific event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// First event of every log.
    ContextCreated {
        context_id: String,
        summary: String,
        #[serde(default)]
        method: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    ContextCompleted,
    ContextReopened,
    /// Directory moved into the archive area.
    ContextArchived { source: String, destination: String },
    /// Only the fields present were changed.
    MetadataUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
    },
    TaskAdded {
        task_id: String,
        subject: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_form: Option<String>,
    },
    TaskStarted { task_id: String },
    TaskCompleted {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        work_summary: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files_changed: Vec<String>,
    },
    TaskBlocked {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    NoteAdded { content: String },
    SessionStarted { session_id: String },
    PlanningStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// A plan document was archived and awaits implementation.
    PlanCreated {
        #[serde(alias = "artifact_path")]
        path: String,
        #[serde(alias = "artifact_hash")]
        hash: String,
    },
    PlanImplementationStarted,
    PlanCompleted,
    HandoffCreated {
        #[serde(alias = "handoff_path")]
        path: String,
    },
    /// `restored_mode` is kept for audit; replay recomputes it.
    HandoffCleared {
        #[serde(default)]
        restored_mode: InFlightMode,
    },
}

impl EventKind {
    /// Wire name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContextCreated { .. } => "context_created",
            Self::ContextCompleted => "context_completed",
            Self::ContextReopened => "context_reopened",
            Self::ContextArchived { .. } => "context_archived",
            Self::MetadataUpdated { .. } => "metadata_updated",
            Self::TaskAdded { .. } => "task_added",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskBlocked { .. } => "task_blocked",
            Self::NoteAdded { .. } => "note_added",
            Self::SessionStarted { .. } => "session_started",
            Self::PlanningStarted { .. } => "planning_started",
            Self::PlanCreated { .. } => "plan_created",
            Self::PlanImplementationStarted => "plan_implementation_started",
            Self::PlanCompleted => "plan_completed",
            Self::HandoffCreated { .. } => "handoff_created",
            Self::HandoffCleared { .. } => "handoff_cleared",
        }
    }
}

/// Why a log line could not become an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line is not a JSON object.
    NotAnObject,
    /// The `timestamp` field is missing or not a string.
    MissingTimestamp,
    /// The `event` field names a type this build does not know.
    UnknownType(String),
    /// A known type with missing or mistyped fields.
    Malformed(String),
}

/// A timestamped event envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// ISO 8601 time the event was appended.
    pub timestamp: String,
    /// Type-specific payload.
    pub kind: EventKind,
}

impl Event {
    /// Wraps a payload with its timestamp.
    pub fn new(timestamp: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: timestamp.into(),
            kind,
        }
    }

    /// Encodes the event as a single JSON object with sorted keys.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(&self.kind)?;
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".into(), Value::String(self.timestamp.clone()));
        }
        Ok(value)
    }

    /// Encodes the event as one newline-terminated log line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(&self.to_value()?)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes a parsed log line.
    ///
    /// Fields beyond `event`, `timestamp` and the variant's own are ignored.
    pub fn from_value(value: Value) -> std::result::Result<Self, DecodeError> {
        let map: &Map<String, Value> = value.as_object().ok_or(DecodeError::NotAnObject)?;
        let timestamp = map
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingTimestamp)?
            .to_string();
        let type_name = map
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value::<EventKind>(value) {
            Ok(kind) => Ok(Self { timestamp, kind }),
            Err(_) if !EVENT_TYPES.contains(&type_name.as_str()) => {
                Err(DecodeError::UnknownType(type_name))
            }
            Err(e) => Err(DecodeError::Malformed(e.to_string())),
        }
    }
}
