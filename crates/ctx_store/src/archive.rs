//! Moving completed contexts between the active and archive areas.
//!
//! The directory is moved before anything is recorded, so a failed move
//! never leaves a `context_archived` event pointing at a directory that did
//! not move.

use crate::atomic::sanitize_error;
use crate::error::{Result, StoreError};
use crate::event::EventKind;
use crate::event_log::EventLog;
use crate::ids::validate_context_id;
use crate::layout::Area;
use crate::projector::apply;
use crate::store::ContextStore;
use crate::types::Context;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

impl ContextStore {
    /// Moves a completed context into the archive area.
    ///
    /// # Errors
    ///
    /// - `ContextNotFound` if the context has no log
    /// - `NotCompleted` unless its status is completed
    /// - `AlreadyExists` if it is already archived or the destination exists
    /// - `ArchiveFailed` if the directory move fails (nothing is recorded)
    pub fn archive(&self, id: &str) -> Result<Context> {
        let (src, area) = self.require(id)?;
        let mut state = self.replay(&src)?;
        let id = state.context.id.clone();

        if area == Area::Archive {
            return Err(StoreError::AlreadyExists(format!("context {id} is already archived")));
        }
        if !state.context.is_completed() {
            return Err(StoreError::NotCompleted(id));
        }

        let dest = self.layout().context_dir(Area::Archive, &id);
        if dest.exists() {
            return Err(StoreError::AlreadyExists(self.layout().relative(&dest)));
        }
        fs::create_dir_all(self.layout().area_dir(Area::Archive))?;
        self.move_dir(&id, &src, &dest)?;

        let kind = EventKind::ContextArchived {
            source: self.layout().relative(&src),
            destination: self.layout().relative(&dest),
        };
        match EventLog::new(&dest).append_sized(self.writer(), kind, self.now()) {
            Ok((event, added)) => {
                apply(&mut state, &event);
                state.log_bytes += added;
            }
            Err(e) => warn!(context_id = %id, error = %e, "archived but could not record context_archived"),
        }

        self.refresh_caches(&mut state, &dest, Area::Archive);
        if let Err(e) = self.remove_index_entry(Area::Active, &id) {
            warn!(context_id = %id, error = %e, "could not drop archived context from active index");
        }
        info!(context_id = %id, "archived context");
        Ok(state.context)
    }

    /// Moves an archived context back to the active area.
    ///
    /// Status is left untouched; [`reopen`](ContextStore::reopen) records
    /// the status change.
    ///
    /// # Errors
    ///
    /// - `ContextNotFound` if there is no archived directory for `id`
    /// - `AlreadyExists` if an active directory with the same id exists
    /// - `ArchiveFailed` if the directory move fails
    pub fn restore(&self, id: &str) -> Result<Context> {
        let id = validate_context_id(id)?;
        let src = self.layout().context_dir(Area::Archive, &id);
        if !src.is_dir() {
            return Err(StoreError::ContextNotFound(id));
        }
        let dest = self.layout().context_dir(Area::Active, &id);
        if dest.exists() {
            return Err(StoreError::AlreadyExists(self.layout().relative(&dest)));
        }
        self.move_dir(&id, &src, &dest)?;

        let mut state = self.replay(&dest)?;
        self.refresh_caches(&mut state, &dest, Area::Active);
        if let Err(e) = self.remove_index_entry(Area::Archive, &id) {
            warn!(context_id = %id, error = %e, "could not drop restored context from archive index");
        }
        info!(context_id = %id, "restored context from archive");
        Ok(state.context)
    }

    fn move_dir(&self, id: &str, src: &Path, dest: &Path) -> Result<()> {
        fs::rename(src, dest).map_err(|e| StoreError::ArchiveFailed {
            context_id: id.to_string(),
            reason: sanitize_error(&e, src),
        })
    }
}
