//! Archival of plan documents into a context folder.

use crate::error::{Result, StoreError};
use crate::ids::{dedupe, slugify};
use crate::store::ContextStore;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Subdirectory of a context holding archived plans.
pub const PLANS_DIR: &str = "plans";

/// Where a plan document was archived and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedPlan {
    /// Path relative to the context folder, `/`-separated.
    pub path: String,
    /// Lowercase hex BLAKE3 hash of the archived bytes.
    pub hash: String,
}

/// Hex BLAKE3 hash of `content`.
pub fn hash_content(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

impl ContextStore {
    /// Copies the plan document at `source` into the context's `plans/`
    /// folder as `<date>-<slug>[-n].md`. The slug comes from the file stem.
    ///
    /// Pass the result to [`record_plan`](ContextStore::record_plan).
    pub fn archive_plan(&self, id: &str, source: &Path) -> Result<ArchivedPlan> {
        let content = fs::read(source)?;
        let hint = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.archive_plan_content(id, &hint, &content)
    }

    /// Archives plan `content` under a name derived from `name_hint`.
    pub fn archive_plan_content(&self, id: &str, name_hint: &str, content: &[u8]) -> Result<ArchivedPlan> {
        if content.is_empty() {
            return Err(StoreError::InvalidArgument("plan document is empty".into()));
        }
        let (dir, _) = self.require(id)?;
        let plans = dir.join(PLANS_DIR);

        let now = self.now();
        let date = now.get(..10).unwrap_or(&now);
        let slug = slugify(name_hint, self.config().ids.slug_max_len);
        let stem = dedupe(&format!("{date}-{slug}"), |c| plans.join(format!("{c}.md")).exists());

        let file_name = format!("{stem}.md");
        self.writer().write(&plans.join(&file_name), content)?;

        let plan = ArchivedPlan {
            path: format!("{PLANS_DIR}/{file_name}"),
            hash: hash_content(content),
        };
        debug!(context_id = id, path = %plan.path, "archived plan document");
        Ok(plan)
    }
}
