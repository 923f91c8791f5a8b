use super::assertions::{Assertion, Field};
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context as _, Result};
use ctx_store::{
    Area, Context, ContextStore, StoreError, SummaryIndex, TaskCompletion, EVENTS_FILE,
    SNAPSHOT_FILE,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// Executes scenarios against a real store root
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    clock: MockClock,
    current_step: usize,
    remembered: HashMap<String, Context>,
}

impl ScenarioRunner {
    /// Create a runner over a freshly initialized root
    pub fn new() -> Result<Self> {
        let workspace = TestWorkspace::empty()?;
        workspace.init_store()?;

        Ok(Self {
            workspace,
            clock: MockClock::new(),
            current_step: 0,
            remembered: HashMap::new(),
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// A new store handle, as a fresh hook process would open it.
    fn store(&self) -> Result<ContextStore> {
        Ok(self.workspace.open_store()?.with_clock(self.clock.as_clock()))
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::ExpectFailure { step, error } => match self.execute_step(step) {
                Ok(()) => bail!("expected {:?}, but the step succeeded", error),
                Err(e) => match e.downcast_ref::<StoreError>() {
                    Some(store_err) if error.matches(store_err) => Ok(()),
                    Some(store_err) => bail!("expected {:?}, got {:?}", error, store_err),
                    None => Err(e.context(format!("expected {:?}", error))),
                },
            },
            ScenarioStep::Wait { duration } => {
                self.clock.advance(*duration);
                Ok(())
            }
            ScenarioStep::Remember { id, label } => {
                let ctx = self.context(id)?;
                self.remembered.insert(label.clone(), ctx);
                Ok(())
            }
            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
            other => {
                let store = self.store()?;
                self.handle_action(&store, other)
            }
        }
    }

    // ===== Action handlers =====

    fn handle_action(&self, store: &ContextStore, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Create {
                id,
                summary,
                method,
                tags,
            } => {
                store.create(id.as_deref(), summary, method, tags)?;
            }
            ScenarioStep::Update { id, summary, tags } => {
                store.update(id, summary.as_deref(), tags.as_deref(), None)?;
            }
            ScenarioStep::Complete { id } => {
                store.complete(id)?;
            }
            ScenarioStep::Reopen { id } => {
                store.reopen(id)?;
            }
            ScenarioStep::Archive { id } => {
                store.archive(id)?;
            }

            ScenarioStep::AddTask {
                id,
                task_id,
                subject,
            } => {
                store.add_task(id, task_id, subject, None, None)?;
            }
            ScenarioStep::StartTask { id, task_id } => {
                store.start_task(id, task_id)?;
            }
            ScenarioStep::CompleteTask {
                id,
                task_id,
                evidence,
            } => {
                let completion = TaskCompletion {
                    evidence: evidence.clone(),
                    ..TaskCompletion::default()
                };
                store.complete_task(id, task_id, completion)?;
            }
            ScenarioStep::BlockTask {
                id,
                task_id,
                reason,
            } => {
                store.block_task(id, task_id, reason.as_deref())?;
            }
            ScenarioStep::Note { id, text } => {
                store.add_note(id, text)?;
            }

            ScenarioStep::BindSession { id, session_id } => {
                store.bind_session(id, session_id)?;
            }
            ScenarioStep::StartPlanning { id, session_id } => {
                store.start_planning(id, session_id.as_deref())?;
            }
            ScenarioStep::RecordPlan { id, name, content } => {
                let plan = store.archive_plan_content(id, name, content)?;
                store.record_plan(id, &plan.path, &plan.hash)?;
            }
            ScenarioStep::StartImplementation { id } => {
                store.start_implementation(id)?;
            }
            ScenarioStep::CompletePlan { id } => {
                store.complete_plan(id)?;
            }
            ScenarioStep::CreateHandoff { id, path } => {
                store.create_handoff(id, path)?;
            }
            ScenarioStep::ClearHandoff { id } => {
                store.clear_handoff(id)?;
            }

            ScenarioStep::TornAppend { id, fragment } => {
                let log = self.log_path(store, id)?;
                self.workspace.append_raw(&log, fragment)?;
            }
            ScenarioStep::CorruptLogLine { id } => {
                let log = self.log_path(store, id)?;
                self.workspace
                    .append_raw(&log, b"{\"event\": \"task_added\", \"timestamp\": \n")?;
            }
            ScenarioStep::CorruptSnapshot { id } => {
                let (dir, _) = store
                    .layout()
                    .locate(id)
                    .ok_or_else(|| anyhow!("no directory for {id}"))?;
                std::fs::write(dir.join(SNAPSHOT_FILE), b"{\"id\": ")?;
            }
            ScenarioStep::CorruptIndex => {
                self.workspace.write_file("index.json", b"{ not an index")?;
            }
            ScenarioStep::DeleteCaches => {
                for area in Area::ALL {
                    for id in store.layout().scan(area)? {
                        let dir = store.layout().context_dir(area, &id);
                        let rel = store.layout().relative(&dir.join(SNAPSHOT_FILE));
                        self.workspace.remove_file(&rel)?;
                    }
                    let index = store.layout().relative(&store.layout().index_path(area));
                    self.workspace.remove_file(&index)?;
                }
            }
            ScenarioStep::Rebuild => {
                let report = store.rebuild_all_caches()?;
                ensure!(report.failed.is_empty(), "rebuild failed for {:?}", report.failed);
            }

            ScenarioStep::ExpectFailure { .. }
            | ScenarioStep::Wait { .. }
            | ScenarioStep::Remember { .. }
            | ScenarioStep::Assert { .. } => unreachable!("handled in execute_step"),
        }
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        let store = self.store()?;

        match assertion {
            Assertion::Status { id, status } => {
                let ctx = self.context(id)?;
                ensure!(ctx.status == *status, "{id} is {}, expected {status}", ctx.status);
            }
            Assertion::Summary { id, summary } => {
                let ctx = self.context(id)?;
                ensure!(ctx.summary == *summary, "{id} summary is {:?}", ctx.summary);
            }
            Assertion::Missing { id } => {
                ensure!(store.get(id)?.is_none(), "{id} unexpectedly exists");
            }
            Assertion::InArea { id, area } => {
                let (_, found) = store
                    .layout()
                    .locate(id)
                    .ok_or_else(|| anyhow!("no directory for {id}"))?;
                ensure!(found == *area, "{id} is in {found:?}, expected {area:?}");
                let other = match area {
                    Area::Active => Area::Archive,
                    Area::Archive => Area::Active,
                };
                ensure!(
                    !store.layout().context_dir(other, id).exists(),
                    "{id} also has a directory in {other:?}"
                );
            }
            Assertion::Indexed { id, area } => {
                ensure!(self.index_ids(&store, *area)?.contains(id), "{id} not in {area:?} index");
            }
            Assertion::NotIndexed { id, area } => {
                ensure!(
                    !self.index_ids(&store, *area)?.contains(id),
                    "{id} unexpectedly in {area:?} index"
                );
            }
            Assertion::ListedIds(expected) => {
                let ids: Vec<String> = store.list(None, None)?.into_iter().map(|c| c.id).collect();
                ensure!(ids == *expected, "listed {ids:?}, expected {expected:?}");
            }

            Assertion::Mode { id, mode } => {
                let ctx = self.context(id)?;
                ensure!(
                    ctx.in_flight.mode == *mode,
                    "{id} is in {}, expected {mode}",
                    ctx.in_flight.mode
                );
            }
            Assertion::ArtifactPath { id, path } => {
                let ctx = self.context(id)?;
                ensure!(
                    ctx.in_flight.artifact_path == *path,
                    "{id} artifact_path is {:?}",
                    ctx.in_flight.artifact_path
                );
            }
            Assertion::HandoffPath { id, path } => {
                let ctx = self.context(id)?;
                ensure!(
                    ctx.in_flight.handoff_path == *path,
                    "{id} handoff_path is {:?}",
                    ctx.in_flight.handoff_path
                );
            }
            Assertion::Sessions { id, sessions } => {
                let ctx = self.context(id)?;
                ensure!(
                    ctx.in_flight.session_ids == *sessions,
                    "{id} sessions are {:?}",
                    ctx.in_flight.session_ids
                );
            }
            Assertion::BoundTo { session_id, id } => {
                let found = store.get_by_session_id(session_id)?.map(|c| c.id);
                ensure!(found == *id, "{session_id} bound to {found:?}, expected {id:?}");
            }
            Assertion::InFlightIds(expected) => {
                let ids: Vec<String> = store.get_all_in_flight()?.into_iter().map(|c| c.id).collect();
                ensure!(ids == *expected, "in flight {ids:?}, expected {expected:?}");
            }

            Assertion::EventCount { id, count } => {
                let n = store.events(id)?.len();
                ensure!(n == *count, "{id} has {n} events, expected {count}");
            }
            Assertion::EventCountOf { id, event, count } => {
                let n = store
                    .events(id)?
                    .iter()
                    .filter(|e| e.kind.name() == event)
                    .count();
                ensure!(n == *count, "{id} has {n} {event} events, expected {count}");
            }
            Assertion::LastEvent { id, event } => {
                let last = store.events(id)?.pop().map(|e| e.kind.name());
                ensure!(last == Some(event.as_str()), "{id} last event is {last:?}");
            }

            Assertion::Task {
                id,
                task_id,
                status,
            } => {
                let task = store
                    .tasks(id)?
                    .into_iter()
                    .find(|t| t.id == *task_id)
                    .ok_or_else(|| anyhow!("{id} has no task {task_id}"))?;
                ensure!(task.status == *status, "{task_id} is {}, expected {status}", task.status);
            }
            Assertion::TaskEvidence {
                id,
                task_id,
                evidence,
            } => {
                let task = store
                    .tasks(id)?
                    .into_iter()
                    .find(|t| t.id == *task_id)
                    .ok_or_else(|| anyhow!("{id} has no task {task_id}"))?;
                ensure!(
                    task.evidence.as_deref() == Some(evidence.as_str()),
                    "{task_id} evidence is {:?}",
                    task.evidence
                );
            }
            Assertion::PendingTaskCount { id, count } => {
                let n = store.pending_tasks(id)?.len();
                ensure!(n == *count, "{id} has {n} pending tasks, expected {count}");
            }
            Assertion::NoteContains { id, text } => {
                ensure!(
                    store.notes(id)?.iter().any(|n| n.content.contains(text.as_str())),
                    "{id} has no note containing {text:?}"
                );
            }

            Assertion::CachesConsistent => {
                let report = store.verify_cache_integrity()?;
                ensure!(!report.has_issues(), "{}: {:?}", report.summary(), report);
            }
            Assertion::SnapshotExists { id } => {
                let (dir, _) = store
                    .layout()
                    .locate(id)
                    .ok_or_else(|| anyhow!("no directory for {id}"))?;
                ensure!(dir.join(SNAPSHOT_FILE).is_file(), "{id} has no snapshot");
            }
            Assertion::MatchesRemembered { id, label, ignore } => {
                let before = self
                    .remembered
                    .get(label)
                    .cloned()
                    .ok_or_else(|| anyhow!("nothing remembered as {label}"))?;
                let mut now = self.context(id)?;
                for field in ignore {
                    match field {
                        Field::Status => now.status = before.status,
                        Field::LastActive => now.last_active = before.last_active.clone(),
                        Field::Folder => now.folder = before.folder.clone(),
                    }
                }
                ensure!(now == before, "{id} differs from {label}:\n{before:#?}\nvs\n{now:#?}");
            }

            Assertion::Custom(check) => check(&store)?,
        }
        Ok(())
    }

    // ===== Helpers =====

    fn context(&self, id: &str) -> Result<Context> {
        self.store()?
            .get(id)?
            .ok_or_else(|| anyhow!("context {id} not found"))
    }

    /// Log path relative to the root, wherever the context lives.
    fn log_path(&self, store: &ContextStore, id: &str) -> Result<String> {
        let (dir, _) = store
            .layout()
            .locate(id)
            .ok_or_else(|| anyhow!("no directory for {id}"))?;
        let log: PathBuf = dir.join(EVENTS_FILE);
        Ok(store.layout().relative(&log))
    }

    fn index_ids(&self, store: &ContextStore, area: Area) -> Result<Vec<String>> {
        Ok(SummaryIndex::load(&store.layout().index_path(area))?
            .map(|index| index.ids())
            .unwrap_or_default())
    }
}
