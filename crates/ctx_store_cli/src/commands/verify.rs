//! Cache verification command.

use super::open_store;
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Compare every cache against the event logs. Read-only.
pub fn run(root: &Path) -> Result<()> {
    let store = open_store(root)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Verifying caches...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = store.verify_cache_integrity();
    pb.finish_and_clear();
    let report = result?;

    println!();
    println!("{}", style("Verification Report:").bold());
    println!("  Contexts checked:   {}", style(report.checked).cyan());

    if !report.mismatches.is_empty() {
        println!("  Mismatches:         {}", style(report.mismatches.len()).red());
        for m in &report.mismatches {
            println!(
                "    {} {} {}: cached {} but log says {}",
                style("×").red(),
                m.id,
                m.field,
                m.cached,
                m.projected
            );
        }
    }
    for (label, ids) in [
        ("Missing snapshots:  ", &report.missing_snapshots),
        ("Unindexed contexts: ", &report.unindexed),
        ("Orphaned entries:   ", &report.orphaned),
        ("Corrupt indexes:    ", &report.corrupt_indexes),
    ] {
        if ids.is_empty() {
            continue;
        }
        println!("  {}{}", label, style(ids.len()).yellow());
        for id in ids {
            println!("    {} {}", style("⚠").yellow(), id);
        }
    }
    if report.corrupt_lines > 0 {
        println!(
            "  Skipped log lines:  {} (logs are never rewritten)",
            style(report.corrupt_lines).yellow()
        );
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
        println!();
        println!("{}", style("Recommendations:").bold());
        println!(
            "  {} Run {} to regenerate caches from the event logs",
            style("→").cyan(),
            style("ctx-store rebuild").cyan()
        );
    } else {
        println!("{} {}", style("✓").green(), style(&report.summary()).green());
    }

    Ok(())
}
