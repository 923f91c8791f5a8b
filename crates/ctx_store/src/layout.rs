//! On-disk layout of a store root.
//!
//! ```text
//! <root>/index.json                       active summary index
//! <root>/contexts/<id>/events.jsonl       source of truth
//! <root>/contexts/<id>/context.json       snapshot cache
//! <root>/contexts/archive/<id>/...        archived contexts, same shape
//! <root>/contexts/archive/index.json      archive summary index
//! ```

use crate::cache::{INDEX_FILE, SNAPSHOT_FILE};
use crate::error::Result;
use crate::event_log::EVENTS_FILE;
use crate::ids::{is_valid_context_id, RESERVED_ID};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Which area a context directory lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// `<root>/contexts/<id>`
    Active,
    /// `<root>/contexts/archive/<id>`
    Archive,
}

impl Area {
    /// Both areas, active first.
    pub const ALL: [Area; 2] = [Area::Active, Area::Archive];
}

/// Path arithmetic for one store root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/contexts`
    pub fn contexts_dir(&self) -> PathBuf {
        self.root.join("contexts")
    }

    /// Directory holding every context of `area`.
    pub fn area_dir(&self, area: Area) -> PathBuf {
        match area {
            Area::Active => self.contexts_dir(),
            Area::Archive => self.contexts_dir().join(RESERVED_ID),
        }
    }

    /// Directory of context `id` in `area`. `id` must already be validated.
    pub fn context_dir(&self, area: Area, id: &str) -> PathBuf {
        self.area_dir(area).join(id)
    }

    /// Summary index of `area`.
    pub fn index_path(&self, area: Area) -> PathBuf {
        match area {
            Area::Active => self.root.join(INDEX_FILE),
            Area::Archive => self.area_dir(Area::Archive).join(INDEX_FILE),
        }
    }

    /// Finds the one canonical directory of `id`, active first.
    pub fn locate(&self, id: &str) -> Option<(PathBuf, Area)> {
        Area::ALL.into_iter().find_map(|area| {
            let dir = self.context_dir(area, id);
            dir.is_dir().then_some((dir, area))
        })
    }

    /// Whether `id` is taken in either area.
    pub fn is_taken(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Ids of every context directory in `area`, sorted.
    ///
    /// A directory counts when its name is a canonical id and it holds an
    /// event log or a snapshot.
    pub fn scan(&self, area: Area) -> Result<Vec<String>> {
        let dir = self.area_dir(area);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_valid_context_id(&name) {
                continue;
            }
            let path = entry.path();
            if path.join(EVENTS_FILE).is_file() || path.join(SNAPSHOT_FILE).is_file() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// `path` relative to the root with `/` separators, for index entries
    /// and audit events. Paths outside the root are returned as given.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.display().to_string(),
        }
    }
}
