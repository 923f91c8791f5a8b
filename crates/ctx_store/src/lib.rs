//! ctx_store Library
//!
//! An event-sourced store for long-running units of work ("contexts")
//! shared by many short-lived processes, providing:
//! - Crash-safe atomic writes and appends
//! - Append-only per-context event logs as the single source of truth
//! - A pure projection from events to current state
//! - Rebuildable snapshot (L1) and summary index (L2) caches
//! - Archive and restore of completed contexts
//!
//! # Quick Start
//!
//! ```
//! use ctx_store::{ContextStore, InFlightMode};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = ContextStore::open(tmp.path()).unwrap();
//!
//! let ctx = store.create(None, "Fix login bug", "manual", &[]).unwrap();
//! assert_eq!(ctx.id, "fix-login-bug");
//!
//! store.record_plan(&ctx.id, "plans/p.md", "abc123").unwrap();
//! let ctx = store.start_implementation(&ctx.id).unwrap();
//! assert_eq!(ctx.in_flight.mode, InFlightMode::Implementing);
//! ```
//!
//! # Recovery
//!
//! Every cache is a function of the logs, so deleting them loses nothing:
//!
//! ```
//! use ctx_store::ContextStore;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = ContextStore::open(tmp.path()).unwrap();
//! store.create(Some("c1"), "Investigate flaky test", "manual", &[]).unwrap();
//!
//! std::fs::remove_file(tmp.path().join("index.json")).unwrap();
//! std::fs::remove_file(tmp.path().join("contexts/c1/context.json")).unwrap();
//!
//! let report = store.rebuild_all_caches().unwrap();
//! assert_eq!(report.active, 1);
//! assert!(store.get("c1").unwrap().is_some());
//! ```

mod archive;
mod atomic;
mod cache;
mod config;
mod error;
mod event;
mod event_log;
mod ids;
mod layout;
mod plans;
mod projector;
mod recovery;
mod store;
mod types;
mod workflow;

pub use atomic::{atomic_replace, sanitize_error, AtomicWriter};
pub use cache::{
    read_current_snapshot, read_snapshot, snapshot_is_stale, write_snapshot, IndexEntry,
    SummaryIndex, INDEX_FILE, SNAPSHOT_FILE,
};
pub use config::{Config, IdConfig, IndexConfig, WriteConfig, CONFIG_FILE};
pub use error::{Result, StoreError};
pub use event::{DecodeError, Event, EventKind, EVENT_TYPES};
pub use event_log::{EventLog, LogReadStats, EVENTS_FILE};
pub use ids::{dedupe, is_valid_context_id, slugify, validate_context_id, MAX_ID_LEN};
pub use layout::{Area, Layout};
pub use plans::{hash_content, ArchivedPlan, PLANS_DIR};
pub use projector::{apply, project, ContextState};
pub use recovery::{CacheMismatch, IntegrityReport, RebuildReport};
pub use store::ContextStore;
pub use types::*;
pub use workflow::TaskCompletion;

use chrono::{DateTime, SecondsFormat, Utc};

/// Time source for event timestamps.
///
/// Allows injecting controlled time into the store for testing ordering
/// and `last_active` behaviour. Only used when set via `with_clock()`.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Formats a timestamp the way events and caches store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
