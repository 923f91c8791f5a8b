use std::time::Duration;

use super::assertions::{Assertion, ErrorMatch};

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Context lifecycle
    Create {
        id: Option<String>,
        summary: String,
        method: String,
        tags: Vec<String>,
    },
    Update {
        id: String,
        summary: Option<String>,
        tags: Option<Vec<String>>,
    },
    Complete {
        id: String,
    },
    Reopen {
        id: String,
    },
    Archive {
        id: String,
    },

    // Tasks and notes
    AddTask {
        id: String,
        task_id: String,
        subject: String,
    },
    StartTask {
        id: String,
        task_id: String,
    },
    CompleteTask {
        id: String,
        task_id: String,
        evidence: Option<String>,
    },
    BlockTask {
        id: String,
        task_id: String,
        reason: Option<String>,
    },
    Note {
        id: String,
        text: String,
    },

    // In-flight transitions
    BindSession {
        id: String,
        session_id: String,
    },
    StartPlanning {
        id: String,
        session_id: Option<String>,
    },
    RecordPlan {
        id: String,
        name: String,
        content: Vec<u8>,
    },
    StartImplementation {
        id: String,
    },
    CompletePlan {
        id: String,
    },
    CreateHandoff {
        id: String,
        path: String,
    },
    ClearHandoff {
        id: String,
    },

    // Time control
    Wait {
        duration: Duration,
    },

    // Failure simulation
    /// A crash mid-append left an unterminated line at the end of the log.
    TornAppend {
        id: String,
        fragment: Vec<u8>,
    },
    /// Garbage line written into the log by something other than the store.
    CorruptLogLine {
        id: String,
    },
    /// Snapshot overwritten with unparsable bytes.
    CorruptSnapshot {
        id: String,
    },
    /// Active index overwritten with unparsable bytes.
    CorruptIndex,
    /// Every snapshot and both indexes removed.
    DeleteCaches,
    Rebuild,

    // State capture for before/after comparisons
    Remember {
        id: String,
        label: String,
    },

    /// Run `step` and require it to fail with a matching error.
    ExpectFailure {
        step: Box<ScenarioStep>,
        error: ErrorMatch,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
