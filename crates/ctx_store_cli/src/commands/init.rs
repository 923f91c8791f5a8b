//! Initialize a store root.

use anyhow::{Context, Result};
use ctx_store::ContextStore;
use std::path::Path;

/// Create the area directories and a default config under `root`.
pub fn run(root: &Path) -> Result<()> {
    let store = ContextStore::init(root).context("Failed to initialize context store")?;

    println!("Initialized context store in {}", store.root().display());
    println!();
    println!("Directory structure:");
    println!("  contexts/<id>/events.jsonl   - Append-only event log (source of truth)");
    println!("  contexts/<id>/context.json   - Snapshot cache (rebuildable)");
    println!("  contexts/<id>/plans/         - Archived plan documents");
    println!("  contexts/archive/            - Completed contexts");
    println!("  index.json                   - Summary index (rebuildable)");
    println!();
    println!("Configuration written to config.toml");

    Ok(())
}
