//! Plan and handoff transitions.

use super::{open_store, print_changed};
use anyhow::{Context, Result};
use std::path::Path;

pub fn start(root: &Path, id: &str, session: Option<&str>) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.start_planning(id, session)?;
    print_changed("Planning", &ctx);
    Ok(())
}

/// Archive `file` into the context and record it as the plan to implement.
pub fn record(root: &Path, id: &str, file: &Path) -> Result<()> {
    let store = open_store(root)?;
    let plan = store
        .archive_plan(id, file)
        .with_context(|| format!("Failed to archive plan document {}", file.display()))?;
    let ctx = store.record_plan(id, &plan.path, &plan.hash)?;
    print_changed("Recorded plan for", &ctx);
    println!("  Plan: {}", plan.path);
    println!("  Hash: {}", plan.hash);
    Ok(())
}

pub fn implement(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.start_implementation(id)?;
    print_changed("Implementing", &ctx);
    Ok(())
}

pub fn complete(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.complete_plan(id)?;
    print_changed("Finished plan for", &ctx);
    Ok(())
}

pub fn handoff_create(root: &Path, id: &str, path: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.create_handoff(id, path)?;
    print_changed("Handoff recorded for", &ctx);
    Ok(())
}

pub fn handoff_clear(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.clear_handoff(id)?;
    print_changed("Handoff cleared for", &ctx);
    Ok(())
}
