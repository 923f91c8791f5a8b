//! Store handle providing the main context API.

use crate::atomic::AtomicWriter;
use crate::cache::{self, IndexEntry, SummaryIndex};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::event::{Event, EventKind};
use crate::event_log::EventLog;
use crate::ids::{dedupe, slugify, validate_context_id};
use crate::layout::{Area, Layout};
use crate::projector::{apply, project, ContextState};
use crate::types::{Context, ContextStatus, InFlightMode};
use crate::{format_timestamp, Clock};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Context store handle.
///
/// Holds no state beyond configuration: every call reads what it needs from
/// disk, so any number of independent processes can share one root.
pub struct ContextStore {
    /// Path arithmetic for the root.
    layout: Layout,
    /// Loaded configuration.
    config: Config,
    /// Writer for every file the store touches.
    writer: AtomicWriter,
    /// Clock for testing (None = system time).
    clock: Option<Arc<dyn Clock>>,
}

impl ContextStore {
    /// Opens the store rooted at `root`, loading `config.toml` if present.
    ///
    /// Directories are created lazily by the first write.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ctx_store::ContextStore;
    ///
    /// let store = ContextStore::open(".ctx").unwrap();
    /// ```
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(root.as_ref())?;
        Ok(Self::with_config(root, config))
    }

    /// Opens the store with an explicit configuration.
    pub fn with_config(root: impl AsRef<Path>, config: Config) -> Self {
        Self {
            layout: Layout::new(root),
            writer: AtomicWriter::new(config.write.clone()),
            config,
            clock: None,
        }
    }

    /// Initializes a store root: area directories and a default config file.
    ///
    /// An existing `config.toml` is kept.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let layout = Layout::new(root);
        fs::create_dir_all(layout.area_dir(Area::Archive))?;
        if !root.join(crate::config::CONFIG_FILE).exists() {
            Config::default().save(root)?;
        }
        Self::open(root)
    }

    /// Sets a custom clock for testing.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Path arithmetic for this store.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a context and returns it.
    ///
    /// Without an explicit id one is generated from `summary` and suffixed
    /// (`-2`, `-3`, ...) until it is free in both areas.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty summary
    /// - `PathTraversal` / `InvalidContextId` for a bad explicit id
    /// - `AlreadyExists` if an explicit id is taken
    pub fn create(
        &self,
        id: Option<&str>,
        summary: &str,
        method: &str,
        tags: &[String],
    ) -> Result<Context> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(StoreError::InvalidArgument("summary must not be empty".into()));
        }
        let explicit = id.map(validate_context_id).transpose()?;

        fs::create_dir_all(self.layout.contexts_dir())?;

        // create_dir (not create_dir_all) so a racing creator loses cleanly
        let (id, dir) = loop {
            let candidate = match &explicit {
                Some(id) if self.layout.is_taken(id) => {
                    return Err(StoreError::AlreadyExists(format!("context {id}")))
                }
                Some(id) => id.clone(),
                None => {
                    let base = slugify(summary, self.config.ids.slug_max_len);
                    dedupe(&base, |c| self.layout.is_taken(c))
                }
            };
            let dir = self.layout.context_dir(Area::Active, &candidate);
            match fs::create_dir(&dir) {
                Ok(()) => break (candidate, dir),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if explicit.is_some() {
                        return Err(StoreError::AlreadyExists(format!("context {candidate}")));
                    }
                    debug!(id = %candidate, "slug taken concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let kind = EventKind::ContextCreated {
            context_id: id.clone(),
            summary: summary.to_string(),
            method: method.to_string(),
            tags: normalize_tags(tags),
        };
        let log = EventLog::new(&dir);
        let (event, added) = match log.append_sized(&self.writer, kind, self.now()) {
            Ok(appended) => appended,
            Err(e) => {
                let _ = fs::remove_dir_all(&dir);
                return Err(e);
            }
        };

        let mut state = ContextState::default();
        apply(&mut state, &event);
        state.log_bytes = added;
        self.refresh_caches(&mut state, &dir, Area::Active);
        debug!(context_id = %id, "created context");
        Ok(state.context)
    }

    /// Returns the current state of a context, or `None` if it has no log.
    ///
    /// Reads the snapshot when it was projected from the log as it is now;
    /// otherwise replays the log and repairs the snapshot.
    ///
    /// # Errors
    ///
    /// `PathTraversal` for an id that tries to leave the root.
    pub fn get(&self, id: &str) -> Result<Option<Context>> {
        let id = validate_context_id(id)?;
        let Some((dir, area)) = self.layout.locate(&id) else {
            return Ok(None);
        };

        if let Some(mut ctx) = cache::read_current_snapshot(&dir) {
            ctx.folder = dir;
            return Ok(Some(ctx));
        }

        let log = EventLog::new(&dir);
        if !log.exists() {
            return Ok(None);
        }

        debug!(context_id = %id, "snapshot missing or stale, replaying log");
        let mut state = self.replay(&dir)?;
        self.refresh_caches(&mut state, &dir, area);
        Ok(Some(state.context))
    }

    /// Full derived state (context, tasks, notes) by replaying the log.
    pub fn state(&self, id: &str) -> Result<Option<ContextState>> {
        let id = validate_context_id(id)?;
        match self.layout.locate(&id) {
            Some((dir, _)) if EventLog::new(&dir).exists() => Ok(Some(self.replay(&dir)?)),
            _ => Ok(None),
        }
    }

    /// Raw events of a context in append order.
    pub fn events(&self, id: &str) -> Result<Vec<Event>> {
        let (dir, _) = self.require(id)?;
        EventLog::new(dir).read()
    }

    /// Lists contexts from both areas, most recently active first.
    ///
    /// Entries come from the summary indexes; an index that is missing,
    /// corrupt or disagrees with the directories is rebuilt by scanning.
    pub fn list(&self, status: Option<ContextStatus>, method: Option<&str>) -> Result<Vec<Context>> {
        let mut contexts = Vec::new();
        for area in Area::ALL {
            for id in self.index_ids(area)? {
                let Some(ctx) = self.get(&id)? else {
                    continue;
                };
                if status.is_some_and(|s| s != ctx.status) {
                    continue;
                }
                if method.is_some_and(|m| m != ctx.method) {
                    continue;
                }
                contexts.push(ctx);
            }
        }
        sort_by_activity(&mut contexts);
        Ok(contexts)
    }

    /// Updates summary, tags and/or method. Only changed fields are recorded;
    /// nothing is appended when nothing changed.
    pub fn update(
        &self,
        id: &str,
        summary: Option<&str>,
        tags: Option<&[String]>,
        method: Option<&str>,
    ) -> Result<Context> {
        self.mutate(id, |state| {
            let ctx = &state.context;
            let summary = summary
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != ctx.summary)
                .map(str::to_string);
            let tags = tags.map(normalize_tags).filter(|t| {
                let current: Vec<String> = ctx.tags.iter().cloned().collect();
                *t != current
            });
            let method = method
                .filter(|m| *m != ctx.method)
                .map(str::to_string);

            if summary.is_none() && tags.is_none() && method.is_none() {
                return Ok(None);
            }
            Ok(Some(EventKind::MetadataUpdated {
                summary,
                tags,
                method,
            }))
        })
    }

    /// Marks a context completed without archiving it.
    ///
    /// No event is appended if it is already completed.
    pub fn mark_completed(&self, id: &str) -> Result<Context> {
        self.mutate(id, |state| {
            if state.context.is_completed() {
                return Ok(None);
            }
            Ok(Some(EventKind::ContextCompleted))
        })
    }

    /// Completes a context and moves it to the archive.
    ///
    /// Calling it again is a no-op, except that a context whose earlier
    /// archive step failed is archived now. If archiving fails the event is
    /// already durable, so the failure is logged and the completed context
    /// is returned from its active location.
    pub fn complete(&self, id: &str) -> Result<Context> {
        let ctx = self.mark_completed(id)?;
        if self.area_of(&ctx) == Area::Archive {
            return Ok(ctx);
        }
        match self.archive(&ctx.id) {
            Ok(archived) => Ok(archived),
            Err(e) => {
                warn!(context_id = %ctx.id, error = %e, "completed context could not be archived");
                Ok(ctx)
            }
        }
    }

    /// Reopens a context, restoring it from the archive first if needed.
    ///
    /// No event is appended if it is already active.
    pub fn reopen(&self, id: &str) -> Result<Context> {
        let (_, area) = self.require(id)?;
        if area == Area::Archive {
            self.restore(id)?;
        }
        self.mutate(id, |state| {
            if !state.context.is_completed() {
                return Ok(None);
            }
            Ok(Some(EventKind::ContextReopened))
        })
    }

    /// The active context most recently bound to `session_id`.
    pub fn get_by_session_id(&self, session_id: &str) -> Result<Option<Context>> {
        Ok(self
            .list(Some(ContextStatus::Active), None)?
            .into_iter()
            .find(|ctx| ctx.in_flight.session_ids.iter().any(|s| s == session_id)))
    }

    /// Active contexts with work in flight, most recently active first.
    pub fn get_all_in_flight(&self) -> Result<Vec<Context>> {
        Ok(self
            .list(Some(ContextStatus::Active), None)?
            .into_iter()
            .filter(|ctx| ctx.in_flight.mode != InFlightMode::None)
            .collect())
    }

    // ===== Internals shared with the other impl blocks =====

    /// Current timestamp string.
    pub(crate) fn now(&self) -> String {
        let at = match &self.clock {
            Some(clock) => clock.now(),
            None => chrono::Utc::now(),
        };
        format_timestamp(at)
    }

    pub(crate) fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    /// Validates `id` and finds its directory.
    pub(crate) fn require(&self, id: &str) -> Result<(PathBuf, Area)> {
        let id = validate_context_id(id)?;
        self.layout
            .locate(&id)
            .filter(|(dir, _)| EventLog::new(dir).exists())
            .ok_or(StoreError::ContextNotFound(id))
    }

    /// Replays the log in `dir`.
    ///
    /// A log whose `context_created` line was lost still yields a usable
    /// context named after its directory.
    pub(crate) fn replay(&self, dir: &Path) -> Result<ContextState> {
        let (events, stats) = EventLog::new(dir).read_with_stats()?;
        let mut state = project(&events);
        state.log_bytes = stats.bytes;
        if state.context.id.is_empty() {
            if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
                warn!(dir = %dir.display(), "log has no context_created event");
                state.context.id = name.to_string();
            }
        }
        state.context.folder = dir.to_path_buf();
        Ok(state)
    }

    /// validate → append → apply → refresh L1 → refresh L2.
    ///
    /// `decide` sees the replayed state and returns the event to append, or
    /// `None` for a no-op.
    pub(crate) fn mutate<F>(&self, id: &str, decide: F) -> Result<Context>
    where
        F: FnOnce(&ContextState) -> Result<Option<EventKind>>,
    {
        let (dir, area) = self.require(id)?;
        let mut state = self.replay(&dir)?;

        let Some(kind) = decide(&state)? else {
            return Ok(state.context);
        };

        let (event, added) = EventLog::new(&dir).append_sized(&self.writer, kind, self.now())?;
        apply(&mut state, &event);
        state.log_bytes += added;
        self.refresh_caches(&mut state, &dir, area);
        Ok(state.context)
    }

    /// Rewrites the snapshot and the index entry. Failures are logged, not
    /// returned: the event is already durable and the next read self-heals.
    ///
    /// If another process appended since `state` was read, the snapshot
    /// records a shorter log than the file holds and reads skip it.
    pub(crate) fn refresh_caches(&self, state: &mut ContextState, dir: &Path, area: Area) {
        let ctx = &mut state.context;
        ctx.folder = dir.to_path_buf();
        if let Err(e) = cache::write_snapshot(&self.writer, dir, ctx, state.log_bytes) {
            warn!(context_id = %ctx.id, error = %e, "snapshot refresh failed");
        }
        let entry = IndexEntry::from_context(ctx, self.layout.relative(dir));
        if let Err(e) = self.upsert_index_entry(area, entry) {
            warn!(context_id = %ctx.id, error = %e, "index refresh failed");
        }
    }

    /// Read-merge-write of one index entry. A missing or corrupt index is
    /// regenerated from the directories instead.
    pub(crate) fn upsert_index_entry(&self, area: Area, entry: IndexEntry) -> Result<()> {
        let path = self.layout.index_path(area);
        match SummaryIndex::load(&path) {
            Ok(Some(mut index)) => {
                index.contexts.insert(entry.id.clone(), entry);
                index.updated_at = self.now();
                index.save(&self.writer, &path)
            }
            Ok(None) | Err(StoreError::CacheCorrupted { .. }) => {
                self.rebuild_index(area).map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Drops one entry from an index, regenerating a missing or corrupt one.
    pub(crate) fn remove_index_entry(&self, area: Area, id: &str) -> Result<()> {
        let path = self.layout.index_path(area);
        match SummaryIndex::load(&path) {
            Ok(Some(mut index)) => {
                if index.contexts.remove(id).is_some() {
                    index.updated_at = self.now();
                    index.save(&self.writer, &path)?;
                }
                Ok(())
            }
            Ok(None) | Err(StoreError::CacheCorrupted { .. }) => {
                self.rebuild_index(area).map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Ids listed by the index of `area`, rebuilding the index first when it
    /// is unreadable or its key set differs from the directories on disk.
    fn index_ids(&self, area: Area) -> Result<Vec<String>> {
        let on_disk = self.layout.scan(area)?;
        match SummaryIndex::load(&self.layout.index_path(area)) {
            Ok(Some(index)) if index.ids() == on_disk => Ok(on_disk),
            Ok(Some(_)) => {
                debug!(?area, "index disagrees with directories, rebuilding");
                Ok(self.rebuild_index_best_effort(area, on_disk))
            }
            Ok(None) => Ok(self.rebuild_index_best_effort(area, on_disk)),
            Err(e) => {
                warn!(?area, error = %e, "index unreadable, falling back to directory scan");
                Ok(self.rebuild_index_best_effort(area, on_disk))
            }
        }
    }

    fn rebuild_index_best_effort(&self, area: Area, on_disk: Vec<String>) -> Vec<String> {
        if let Err(e) = self.rebuild_index(area) {
            warn!(?area, error = %e, "index rebuild failed");
        }
        on_disk
    }

    fn area_of(&self, ctx: &Context) -> Area {
        if ctx.folder.starts_with(self.layout.area_dir(Area::Archive)) {
            Area::Archive
        } else {
            Area::Active
        }
    }
}

/// Trims, drops empties, sorts and de-duplicates.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn sort_by_activity(contexts: &mut [Context]) {
    contexts.sort_by(|a, b| {
        b.last_active
            .cmp(&a.last_active)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("layout", &self.layout)
            .field("config", &self.config)
            .finish()
    }
}
