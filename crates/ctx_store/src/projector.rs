//! Deterministic fold of an event sequence into current state.
//!
//! [`project`] is pure: no I/O, no clock. The same events always produce
//! the same [`ContextState`], which is what lets every cache be thrown away
//! and regenerated from the log.

use crate::event::{Event, EventKind};
use crate::types::{Context, ContextStatus, InFlightMode, Note, Task, TaskStatus};
use std::collections::BTreeMap;

/// Everything derivable from one context's log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextState {
    /// The entity persisted as the `context.json` snapshot.
    pub context: Context,
    /// Tasks keyed by caller-assigned id.
    pub tasks: BTreeMap<String, Task>,
    /// Notes in append order.
    pub notes: Vec<Note>,
    /// Length of the log this state was folded from. Zero for a projection
    /// of events that did not come from disk.
    pub log_bytes: u64,
}

impl ContextState {
    /// Tasks that are not completed, in id order.
    pub fn open_tasks(&self) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.is_open()).collect()
    }
}

/// Folds `events` in order into a fresh state.
pub fn project(events: &[Event]) -> ContextState {
    let mut state = ContextState::default();
    for event in events {
        apply(&mut state, event);
    }
    state
}

/// Applies one event to `state`.
///
/// Task events other than `task_added` are no-ops for unknown task ids.
pub fn apply(state: &mut ContextState, event: &Event) {
    let ts = &event.timestamp;
    let ctx = &mut state.context;
    let in_flight = &mut ctx.in_flight;

    match &event.kind {
        EventKind::ContextCreated {
            context_id,
            summary,
            method,
            tags,
        } => {
            ctx.id = context_id.clone();
            ctx.summary = summary.clone();
            ctx.method = method.clone();
            ctx.tags = tags.iter().cloned().collect();
            ctx.status = ContextStatus::Active;
            ctx.created_at = ts.clone();
        }
        EventKind::ContextCompleted => ctx.status = ContextStatus::Completed,
        EventKind::ContextReopened => ctx.status = ContextStatus::Active,
        EventKind::ContextArchived { .. } => {}
        EventKind::MetadataUpdated {
            summary,
            tags,
            method,
        } => {
            if let Some(summary) = summary {
                ctx.summary = summary.clone();
            }
            if let Some(tags) = tags {
                ctx.tags = tags.iter().cloned().collect();
            }
            if let Some(method) = method {
                ctx.method = method.clone();
            }
        }

        EventKind::TaskAdded {
            task_id,
            subject,
            description,
            active_form,
        } => {
            let task = state.tasks.entry(task_id.clone()).or_default();
            task.id = task_id.clone();
            task.subject = subject.clone();
            if description.is_some() {
                task.description = description.clone();
            }
            if active_form.is_some() {
                task.active_form = active_form.clone();
            }
        }
        EventKind::TaskStarted { task_id } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.status = TaskStatus::InProgress;
            }
        }
        EventKind::TaskCompleted {
            task_id,
            evidence,
            work_summary,
            files_changed,
        } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.status = TaskStatus::Completed;
                if evidence.is_some() {
                    task.evidence = evidence.clone();
                }
                if work_summary.is_some() {
                    task.work_summary = work_summary.clone();
                }
                if !files_changed.is_empty() {
                    task.files_changed = files_changed.clone();
                }
            }
        }
        EventKind::TaskBlocked { task_id, reason } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.status = TaskStatus::Blocked;
                task.blocked_reason = reason.clone();
            }
        }
        EventKind::NoteAdded { content } => state.notes.push(Note {
            timestamp: ts.clone(),
            content: content.clone(),
        }),

        EventKind::SessionStarted { session_id } => {
            in_flight.bind_session(session_id);
        }
        EventKind::PlanningStarted { session_id } => {
            in_flight.mode = InFlightMode::Planning;
            in_flight.started_at = Some(ts.clone());
            if let Some(session_id) = session_id {
                in_flight.bind_session(session_id);
            }
        }
        EventKind::PlanCreated { path, hash } => {
            in_flight.mode = InFlightMode::PendingImplementation;
            in_flight.artifact_path = Some(path.clone());
            in_flight.artifact_hash = Some(hash.clone());
            in_flight.handoff_path = None;
            in_flight.started_at = Some(ts.clone());
        }
        EventKind::PlanImplementationStarted => {
            in_flight.mode = InFlightMode::Implementing;
            in_flight.started_at = Some(ts.clone());
        }
        EventKind::PlanCompleted => {
            in_flight.mode = InFlightMode::None;
            in_flight.artifact_path = None;
            in_flight.artifact_hash = None;
            in_flight.handoff_path = None;
            in_flight.started_at = None;
        }
        EventKind::HandoffCreated { path } => {
            in_flight.mode = InFlightMode::HandoffPending;
            in_flight.handoff_path = Some(path.clone());
            in_flight.started_at = Some(ts.clone());
        }
        EventKind::HandoffCleared { .. } => {
            // Recomputed from artifact presence rather than trusting the
            // recorded restored_mode.
            in_flight.mode = in_flight.mode_after_handoff();
            in_flight.handoff_path = None;
            in_flight.started_at = Some(ts.clone());
        }
    }

    ctx.last_active = ts.clone();
}
