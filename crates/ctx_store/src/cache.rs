//! Read-optimized mirrors of the event logs.
//!
//! Two tiers, neither authoritative:
//! - L1: `context.json` per context, the full projected [`Context`].
//! - L2: `index.json` per area, a [`SummaryIndex`] of lightweight entries.
//!
//! Both are written through the atomic writer, so racing processes may
//! overwrite each other's refresh but never expose a half-written file.

use crate::atomic::AtomicWriter;
use crate::error::{Result, StoreError};
use crate::event_log::EVENTS_FILE;
use crate::types::{Context, ContextStatus, InFlightMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the per-context snapshot.
pub const SNAPSHOT_FILE: &str = "context.json";

/// File name of a summary index.
pub const INDEX_FILE: &str = "index.json";

/// On-disk form of `context.json`: the context plus the log length it was
/// projected from.
#[derive(Serialize)]
struct SnapshotOut<'a> {
    #[serde(flatten)]
    context: &'a Context,
    log_bytes: u64,
}

#[derive(Deserialize)]
struct SnapshotIn {
    #[serde(flatten)]
    context: Context,
    #[serde(default)]
    log_bytes: Option<u64>,
}

/// Reads the snapshot in `context_dir`, whether or not it is current.
///
/// Missing and unparsable snapshots both read as `None`; the latter is
/// logged since it means a cache needs rebuilding.
pub fn read_snapshot(context_dir: &Path) -> Option<Context> {
    load_snapshot(context_dir).map(|s| s.context)
}

/// Reads the snapshot in `context_dir` only if it was projected from the
/// log exactly as it is now.
///
/// A snapshot written from a state that missed another writer's event
/// records a shorter log than the file holds, so it is never served.
pub fn read_current_snapshot(context_dir: &Path) -> Option<Context> {
    let snapshot = load_snapshot(context_dir)?;
    let log_len = log_len(context_dir);
    if snapshot.log_bytes.is_some() && snapshot.log_bytes == log_len {
        Some(snapshot.context)
    } else {
        debug!(
            dir = %context_dir.display(),
            recorded = ?snapshot.log_bytes,
            actual = ?log_len,
            "snapshot behind its log"
        );
        None
    }
}

fn load_snapshot(context_dir: &Path) -> Option<SnapshotIn> {
    let path = context_dir.join(SNAPSHOT_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable snapshot");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt snapshot, ignoring");
            None
        }
    }
}

/// Rewrites the snapshot in `context_dir` in full. `log_bytes` is the
/// length of the log `ctx` was projected from.
pub fn write_snapshot(
    writer: &AtomicWriter,
    context_dir: &Path,
    ctx: &Context,
    log_bytes: u64,
) -> Result<()> {
    let snapshot = SnapshotOut {
        context: ctx,
        log_bytes,
    };
    let mut json = serde_json::to_string_pretty(&snapshot)?;
    json.push('\n');
    writer.write(&context_dir.join(SNAPSHOT_FILE), json.as_bytes())
}

/// Whether the snapshot is missing or was projected from a different log
/// length than the file has now. A missing log is never stale.
pub fn snapshot_is_stale(context_dir: &Path) -> bool {
    if log_len(context_dir).is_none() {
        return false;
    }
    read_current_snapshot(context_dir).is_none()
}

fn log_len(context_dir: &Path) -> Option<u64> {
    fs::metadata(context_dir.join(EVENTS_FILE)).map(|m| m.len()).ok()
}

/// Lightweight per-context summary kept in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Context id, also the map key.
    pub id: String,
    /// Lifecycle status.
    pub status: ContextStatus,
    /// Workflow that owns the context.
    pub method: String,
    /// Free-form description.
    pub summary: String,
    /// Timestamp of `context_created`.
    pub created_at: String,
    /// Timestamp of the latest event.
    pub last_active: String,
    /// Directory relative to the store root.
    pub folder: String,
    /// Current in-flight mode.
    pub in_flight_mode: InFlightMode,
}

impl IndexEntry {
    /// Summarizes `ctx`, which lives at `folder` (relative to the root).
    pub fn from_context(ctx: &Context, folder: String) -> Self {
        Self {
            id: ctx.id.clone(),
            status: ctx.status,
            method: ctx.method.clone(),
            summary: ctx.summary.clone(),
            created_at: ctx.created_at.clone(),
            last_active: ctx.last_active.clone(),
            folder,
            in_flight_mode: ctx.in_flight.mode,
        }
    }
}

/// Global summary map for one area (`index.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryIndex {
    /// Format version from the `[index]` config.
    pub version: u32,
    /// When the index was last written.
    pub updated_at: String,
    /// Entries keyed by context id.
    #[serde(default)]
    pub contexts: BTreeMap<String, IndexEntry>,
}

impl SummaryIndex {
    /// An empty index.
    pub fn new(version: u32, updated_at: String) -> Self {
        Self {
            version,
            updated_at,
            contexts: BTreeMap::new(),
        }
    }

    /// Loads an index file.
    ///
    /// # Errors
    ///
    /// `CacheCorrupted` if the file exists but does not parse. A missing
    /// file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::CacheCorrupted {
                message: format!("{}: {}", INDEX_FILE, e),
            })
    }

    /// Writes the whole index atomically.
    pub fn save(&self, writer: &AtomicWriter, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        writer.write(path, json.as_bytes())
    }

    /// Ids in the index, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }
}
