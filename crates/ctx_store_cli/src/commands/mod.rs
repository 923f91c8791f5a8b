//! CLI commands.

pub mod context;
pub mod events;
pub mod init;
pub mod plan;
pub mod rebuild;
pub mod session;
pub mod task;
pub mod verify;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use console::style;
use ctx_store::{Context, ContextStatus, ContextStore, InFlightMode};
use std::path::Path;
use tracing::debug;

/// Opens the store at `root`.
pub(crate) fn open_store(root: &Path) -> Result<ContextStore> {
    debug!(root = %root.display(), "opening context store");
    ContextStore::open(root)
        .with_context(|| format!("Failed to open context store at {}", root.display()))
}

/// Renders a stored RFC 3339 timestamp in local time.
pub(crate) fn local_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

pub(crate) fn styled_status(status: ContextStatus) -> String {
    match status {
        ContextStatus::Active => style(status).green().to_string(),
        ContextStatus::Completed => style(status).dim().to_string(),
    }
}

pub(crate) fn styled_mode(mode: InFlightMode) -> String {
    match mode {
        InFlightMode::None => style(mode).dim().to_string(),
        InFlightMode::HandoffPending => style(mode).yellow().to_string(),
        _ => style(mode).cyan().to_string(),
    }
}

/// One-line confirmation after a mutation.
pub(crate) fn print_changed(verb: &str, ctx: &Context) {
    println!(
        "{} {} {} ({}, {})",
        style("✓").green(),
        verb,
        style(&ctx.id).bold(),
        styled_status(ctx.status),
        styled_mode(ctx.in_flight.mode)
    );
}
