//! Cache rebuild and verification tools.
//!
//! Everything here treats the event logs as the only input. Rebuilds
//! overwrite caches; verification only reads.

use crate::cache::{self, IndexEntry, SummaryIndex};
use crate::error::{Result, StoreError};
use crate::event_log::EventLog;
use crate::layout::Area;
use crate::store::ContextStore;
use crate::types::Context;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Report from a full cache rebuild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Contexts now listed in the active index.
    pub active: usize,

    /// Contexts now listed in the archive index.
    pub archived: usize,

    /// Snapshots rewritten from their logs.
    pub snapshots: usize,

    /// Context ids whose snapshot could not be rebuilt.
    pub failed: Vec<String>,
}

/// One field where a snapshot disagrees with a fresh projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMismatch {
    /// Context whose snapshot disagrees.
    pub id: String,
    /// `status` or `in_flight.mode`
    pub field: &'static str,
    /// Value held by the snapshot.
    pub cached: String,
    /// Value a replay of the log produces.
    pub projected: String,
}

/// Report from a read-only cache verification.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Number of contexts checked.
    pub checked: usize,

    /// Snapshot fields that disagree with the log.
    pub mismatches: Vec<CacheMismatch>,

    /// Contexts with a log but no readable snapshot.
    pub missing_snapshots: Vec<String>,

    /// Contexts on disk but absent from their area's index.
    pub unindexed: Vec<String>,

    /// Index entries with no directory behind them.
    pub orphaned: Vec<String>,

    /// Index files that do not parse.
    pub corrupt_indexes: Vec<String>,

    /// Log lines skipped as unparsable. Informational: logs are never repaired.
    pub corrupt_lines: usize,
}

impl IntegrityReport {
    /// Returns true if any cache disagrees with the logs.
    pub fn has_issues(&self) -> bool {
        !self.mismatches.is_empty()
            || !self.missing_snapshots.is_empty()
            || !self.unindexed.is_empty()
            || !self.orphaned.is_empty()
            || !self.corrupt_indexes.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            return format!("Caches are consistent. {} contexts checked.", self.checked);
        }
        let mut issues = Vec::new();
        if !self.mismatches.is_empty() {
            issues.push(format!("{} snapshot mismatches", self.mismatches.len()));
        }
        if !self.missing_snapshots.is_empty() {
            issues.push(format!("{} missing snapshots", self.missing_snapshots.len()));
        }
        if !self.unindexed.is_empty() {
            issues.push(format!("{} unindexed contexts", self.unindexed.len()));
        }
        if !self.orphaned.is_empty() {
            issues.push(format!("{} orphaned index entries", self.orphaned.len()));
        }
        if !self.corrupt_indexes.is_empty() {
            issues.push(format!("{} corrupt indexes", self.corrupt_indexes.len()));
        }
        format!("Caches have issues: {}", issues.join(", "))
    }
}

impl ContextStore {
    /// Replays the log in `dir` and rewrites its snapshot.
    ///
    /// Returns `None` if `dir` holds no event log.
    pub fn rebuild_context_from_events(&self, dir: &Path) -> Result<Option<Context>> {
        if !EventLog::new(dir).exists() {
            return Ok(None);
        }
        let state = self.replay(dir)?;
        cache::write_snapshot(self.writer(), dir, &state.context, state.log_bytes)?;
        Ok(Some(state.context))
    }

    /// Regenerates the active index from the context directories.
    pub fn rebuild_index_from_folders(&self) -> Result<usize> {
        self.rebuild_index(Area::Active)
    }

    /// Regenerates the archive index from the archived directories.
    pub fn rebuild_archive_index(&self) -> Result<usize> {
        self.rebuild_index(Area::Archive)
    }

    /// Regenerates every snapshot and both indexes from the logs alone.
    ///
    /// A context whose snapshot cannot be written is reported in `failed`
    /// and does not stop the rebuild.
    pub fn rebuild_all_caches(&self) -> Result<RebuildReport> {
        let mut report = RebuildReport::default();

        for area in Area::ALL {
            for id in self.layout().scan(area)? {
                let dir = self.layout().context_dir(area, &id);
                match self.rebuild_context_from_events(&dir) {
                    Ok(Some(_)) => report.snapshots += 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(context_id = %id, error = %e, "snapshot rebuild failed");
                        report.failed.push(id);
                    }
                }
            }
        }

        report.active = self.rebuild_index(Area::Active)?;
        report.archived = self.rebuild_index(Area::Archive)?;
        info!(
            active = report.active,
            archived = report.archived,
            failed = report.failed.len(),
            "rebuilt caches"
        );
        Ok(report)
    }

    /// Compares every cache against a fresh projection of its log.
    ///
    /// Nothing is written.
    pub fn verify_cache_integrity(&self) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();

        for area in Area::ALL {
            let on_disk = self.layout().scan(area)?;
            let index_path = self.layout().index_path(area);
            let indexed: Option<BTreeSet<String>> = match SummaryIndex::load(&index_path) {
                Ok(index) => index.map(|i| i.contexts.into_keys().collect()),
                Err(StoreError::CacheCorrupted { .. }) => {
                    report.corrupt_indexes.push(self.layout().relative(&index_path));
                    None
                }
                Err(e) => return Err(e),
            };

            for id in &on_disk {
                let dir = self.layout().context_dir(area, id);
                if !indexed.as_ref().is_some_and(|ids| ids.contains(id)) {
                    report.unindexed.push(id.clone());
                }

                let log = EventLog::new(&dir);
                if !log.exists() {
                    continue;
                }
                report.checked += 1;

                let (events, stats) = log.read_with_stats()?;
                report.corrupt_lines += stats.corrupt;
                let projected = crate::projector::project(&events).context;

                let Some(cached) = cache::read_snapshot(&dir) else {
                    report.missing_snapshots.push(id.clone());
                    continue;
                };
                if cached.status != projected.status {
                    report.mismatches.push(CacheMismatch {
                        id: id.clone(),
                        field: "status",
                        cached: cached.status.to_string(),
                        projected: projected.status.to_string(),
                    });
                }
                if cached.in_flight.mode != projected.in_flight.mode {
                    report.mismatches.push(CacheMismatch {
                        id: id.clone(),
                        field: "in_flight.mode",
                        cached: cached.in_flight.mode.to_string(),
                        projected: projected.in_flight.mode.to_string(),
                    });
                }
            }

            if let Some(indexed) = indexed {
                report
                    .orphaned
                    .extend(indexed.into_iter().filter(|id| !on_disk.contains(id)));
            }
        }

        Ok(report)
    }

    /// Rewrites the index of `area` from its directories and returns the
    /// number of entries. Each entry comes from a fresh snapshot when there
    /// is one, else from the log.
    pub(crate) fn rebuild_index(&self, area: Area) -> Result<usize> {
        let mut index = SummaryIndex::new(self.config().index.version, self.now());

        for id in self.layout().scan(area)? {
            let dir = self.layout().context_dir(area, &id);
            let ctx = match cache::read_current_snapshot(&dir) {
                Some(ctx) => ctx,
                None if EventLog::new(&dir).exists() => self.replay(&dir)?.context,
                None => continue,
            };
            let entry = IndexEntry::from_context(&ctx, self.layout().relative(&dir));
            index.contexts.insert(id, entry);
        }

        let count = index.contexts.len();
        index.save(self.writer(), &self.layout().index_path(area))?;
        Ok(count)
    }
}
