//! Rebuild command implementation.

use super::open_store;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

/// Regenerate every snapshot and both indexes from the event logs.
pub fn run(root: &Path) -> Result<()> {
    let start = Instant::now();
    let store = open_store(root)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Rebuilding caches from event logs...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = store.rebuild_all_caches();
    pb.finish_and_clear();
    let report = result.context("Failed to rebuild caches")?;

    println!(
        "{} Rebuilt {} snapshots in {:.2}s",
        style("✓").green(),
        style(report.snapshots).cyan(),
        start.elapsed().as_secs_f64()
    );
    println!("  Active contexts:    {}", style(report.active).cyan());
    println!("  Archived contexts:  {}", style(report.archived).cyan());
    if !report.failed.is_empty() {
        println!("  Failed:             {}", style(report.failed.len()).red());
        for id in &report.failed {
            println!("    {} {}", style("×").red(), id);
        }
    }

    Ok(())
}
