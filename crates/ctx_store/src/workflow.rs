//! Tasks, notes, session binding and the in-flight state machine.
//!
//! Every operation here is a [`ContextStore::mutate`] call: the decision is
//! made against freshly replayed state, so two processes interleaving calls
//! on one context each see the other's durable events.

use crate::error::{Result, StoreError};
use crate::event::EventKind;
use crate::projector::ContextState;
use crate::store::ContextStore;
use crate::types::{Context, InFlightMode, Note, Task, TaskStatus};

/// Optional completion details recorded with `task_completed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCompletion {
    /// How the work was verified, e.g. "tests pass".
    pub evidence: Option<String>,
    /// What was done.
    pub work_summary: Option<String>,
    /// Files touched while doing it.
    pub files_changed: Vec<String>,
}

impl TaskCompletion {
    /// Completion backed by a line of evidence.
    pub fn with_evidence(evidence: impl Into<String>) -> Self {
        Self {
            evidence: Some(evidence.into()),
            ..Self::default()
        }
    }
}

impl ContextStore {
    // ===== Tasks and notes =====

    /// Adds a task under a caller-assigned id.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the id is in use; ids are never renumbered.
    pub fn add_task(
        &self,
        id: &str,
        task_id: &str,
        subject: &str,
        description: Option<&str>,
        active_form: Option<&str>,
    ) -> Result<Context> {
        let task_id = required("task id", task_id)?;
        let subject = required("subject", subject)?;
        self.mutate(id, |state| {
            if state.tasks.contains_key(&task_id) {
                return Err(StoreError::AlreadyExists(format!(
                    "task {task_id} in {}",
                    state.context.id
                )));
            }
            Ok(Some(EventKind::TaskAdded {
                task_id,
                subject,
                description: description.map(str::to_string),
                active_form: active_form.map(str::to_string),
            }))
        })
    }

    /// Marks a task in progress. No-op if it already is.
    pub fn start_task(&self, id: &str, task_id: &str) -> Result<Context> {
        self.mutate(id, |state| {
            let task = existing_task(state, task_id)?;
            if task.status == TaskStatus::InProgress {
                return Ok(None);
            }
            Ok(Some(EventKind::TaskStarted {
                task_id: task_id.to_string(),
            }))
        })
    }

    /// Marks a task completed with optional evidence.
    pub fn complete_task(&self, id: &str, task_id: &str, completion: TaskCompletion) -> Result<Context> {
        self.mutate(id, |state| {
            existing_task(state, task_id)?;
            Ok(Some(EventKind::TaskCompleted {
                task_id: task_id.to_string(),
                evidence: completion.evidence,
                work_summary: completion.work_summary,
                files_changed: completion.files_changed,
            }))
        })
    }

    /// Marks a task blocked.
    pub fn block_task(&self, id: &str, task_id: &str, reason: Option<&str>) -> Result<Context> {
        self.mutate(id, |state| {
            existing_task(state, task_id)?;
            Ok(Some(EventKind::TaskBlocked {
                task_id: task_id.to_string(),
                reason: reason.map(str::to_string),
            }))
        })
    }

    /// Appends a free-form note.
    pub fn add_note(&self, id: &str, content: &str) -> Result<Context> {
        let content = required("note", content)?;
        self.mutate(id, |_| Ok(Some(EventKind::NoteAdded { content })))
    }

    /// All tasks of a context in id order.
    pub fn tasks(&self, id: &str) -> Result<Vec<Task>> {
        Ok(self.replay_required(id)?.tasks.into_values().collect())
    }

    /// Tasks not yet completed, in id order.
    pub fn pending_tasks(&self, id: &str) -> Result<Vec<Task>> {
        Ok(self
            .replay_required(id)?
            .tasks
            .into_values()
            .filter(Task::is_open)
            .collect())
    }

    /// Notes in append order.
    pub fn notes(&self, id: &str) -> Result<Vec<Note>> {
        Ok(self.replay_required(id)?.notes)
    }

    // ===== Sessions =====

    /// Binds a host session to a context. No-op if already bound.
    pub fn bind_session(&self, id: &str, session_id: &str) -> Result<Context> {
        let session_id = required("session id", session_id)?;
        self.mutate(id, |state| {
            if is_bound(state, &session_id) {
                return Ok(None);
            }
            Ok(Some(EventKind::SessionStarted { session_id }))
        })
    }

    // ===== In-flight transitions =====

    /// Enters `planning`, optionally binding the planning session.
    ///
    /// While already planning this only binds a new session, if one is given.
    pub fn start_planning(&self, id: &str, session_id: Option<&str>) -> Result<Context> {
        self.mutate(id, |state| {
            let mode = state.context.in_flight.mode;
            if mode == InFlightMode::Planning {
                return Ok(session_id
                    .filter(|s| !s.is_empty() && !is_bound(state, s))
                    .map(|s| EventKind::SessionStarted {
                        session_id: s.to_string(),
                    }));
            }
            check_transition(mode, InFlightMode::Planning)?;
            Ok(Some(EventKind::PlanningStarted {
                session_id: session_id.filter(|s| !s.is_empty()).map(str::to_string),
            }))
        })
    }

    /// Records an archived plan document and enters `pending_implementation`.
    ///
    /// `path` is relative to the context folder so it survives archiving;
    /// see [`ContextStore::archive_plan`].
    pub fn record_plan(&self, id: &str, path: &str, hash: &str) -> Result<Context> {
        let path = required("plan path", path)?;
        let hash = required("plan hash", hash)?;
        self.mutate(id, |state| {
            check_transition(state.context.in_flight.mode, InFlightMode::PendingImplementation)?;
            Ok(Some(EventKind::PlanCreated { path, hash }))
        })
    }

    /// Enters `implementing`. No-op if already implementing.
    pub fn start_implementation(&self, id: &str) -> Result<Context> {
        self.mutate(id, |state| {
            let mode = state.context.in_flight.mode;
            if mode == InFlightMode::Implementing {
                return Ok(None);
            }
            check_transition(mode, InFlightMode::Implementing)?;
            Ok(Some(EventKind::PlanImplementationStarted))
        })
    }

    /// Ends the plan cycle, clearing artifact and handoff references.
    pub fn complete_plan(&self, id: &str) -> Result<Context> {
        self.mutate(id, |state| {
            check_transition(state.context.in_flight.mode, InFlightMode::None)?;
            Ok(Some(EventKind::PlanCompleted))
        })
    }

    /// Enters `handoff_pending`, keeping any plan artifact reference.
    pub fn create_handoff(&self, id: &str, path: &str) -> Result<Context> {
        let path = required("handoff path", path)?;
        self.mutate(id, |state| {
            check_transition(state.context.in_flight.mode, InFlightMode::HandoffPending)?;
            Ok(Some(EventKind::HandoffCreated { path }))
        })
    }

    /// Leaves `handoff_pending` for `implementing` if a plan artifact is
    /// still referenced, else for `none`.
    pub fn clear_handoff(&self, id: &str) -> Result<Context> {
        self.mutate(id, |state| {
            let in_flight = &state.context.in_flight;
            let restored_mode = in_flight.mode_after_handoff();
            if in_flight.mode != InFlightMode::HandoffPending {
                return Err(StoreError::InvalidStateTransition {
                    from: in_flight.mode.to_string(),
                    to: restored_mode.to_string(),
                });
            }
            Ok(Some(EventKind::HandoffCleared { restored_mode }))
        })
    }

    fn replay_required(&self, id: &str) -> Result<ContextState> {
        let (dir, _) = self.require(id)?;
        self.replay(&dir)
    }
}

fn required(what: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

fn existing_task<'a>(state: &'a ContextState, task_id: &str) -> Result<&'a Task> {
    state.tasks.get(task_id).ok_or_else(|| StoreError::TaskNotFound {
        context_id: state.context.id.clone(),
        task_id: task_id.to_string(),
    })
}

fn is_bound(state: &ContextState, session_id: &str) -> bool {
    state.context.in_flight.session_ids.iter().any(|s| s == session_id)
}

fn check_transition(from: InFlightMode, to: InFlightMode) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
