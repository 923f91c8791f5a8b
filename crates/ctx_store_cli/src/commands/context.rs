//! Context lifecycle commands.

use super::{local_time, open_store, print_changed, styled_mode, styled_status};
use anyhow::{anyhow, bail, Result};
use console::style;
use ctx_store::{ContextStatus, TaskStatus};
use std::path::Path;

pub fn create(
    root: &Path,
    id: Option<&str>,
    summary: &str,
    method: &str,
    tags: &[String],
) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.create(id, summary, method, tags)?;
    print_changed("Created", &ctx);
    println!("  Folder: {}", store.layout().relative(&ctx.folder));
    Ok(())
}

pub fn list(root: &Path, status: Option<&str>, method: Option<&str>, json: bool) -> Result<()> {
    let status = status.map(parse_status).transpose()?;
    let store = open_store(root)?;
    let contexts = store.list(status, method)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contexts)?);
        return Ok(());
    }
    if contexts.is_empty() {
        println!("No contexts");
        return Ok(());
    }
    for ctx in &contexts {
        println!(
            "{:<32} {:<10} {:<24} {:<16} {}",
            style(&ctx.id).bold(),
            styled_status(ctx.status),
            styled_mode(ctx.in_flight.mode),
            local_time(&ctx.last_active),
            ctx.summary
        );
    }
    Ok(())
}

pub fn show(root: &Path, id: &str, json: bool) -> Result<()> {
    let store = open_store(root)?;
    let state = store
        .state(id)?
        .ok_or_else(|| anyhow!("Context not found: {id}"))?;
    let ctx = &state.context;

    if json {
        println!("{}", serde_json::to_string_pretty(ctx)?);
        return Ok(());
    }

    println!("{}", style(&ctx.id).bold());
    println!("  Summary:     {}", ctx.summary);
    println!("  Status:      {}", styled_status(ctx.status));
    println!("  Method:      {}", ctx.method);
    if !ctx.tags.is_empty() {
        let tags: Vec<&str> = ctx.tags.iter().map(String::as_str).collect();
        println!("  Tags:        {}", tags.join(", "));
    }
    println!("  Created:     {}", local_time(&ctx.created_at));
    println!("  Last active: {}", local_time(&ctx.last_active));
    println!("  Folder:      {}", store.layout().relative(&ctx.folder));

    let in_flight = &ctx.in_flight;
    println!("  In flight:   {}", styled_mode(in_flight.mode));
    if let Some(path) = &in_flight.artifact_path {
        println!("    Plan:      {}", path);
    }
    if let Some(hash) = &in_flight.artifact_hash {
        println!("    Hash:      {}", hash);
    }
    if let Some(path) = &in_flight.handoff_path {
        println!("    Handoff:   {}", path);
    }
    if !in_flight.session_ids.is_empty() {
        println!("    Sessions:  {}", in_flight.session_ids.join(", "));
    }

    if !state.tasks.is_empty() {
        println!();
        println!("{}", style("Tasks:").bold());
        for task in state.tasks.values() {
            let marker = match task.status {
                TaskStatus::Completed => style("✓").green(),
                TaskStatus::InProgress => style("→").cyan(),
                TaskStatus::Blocked => style("⚠").yellow(),
                TaskStatus::Pending => style("·").dim(),
            };
            println!("  {} {} {}", marker, task.id, task.subject);
        }
    }
    if !state.notes.is_empty() {
        println!();
        println!("{}", style("Notes:").bold());
        for note in &state.notes {
            println!("  {} {}", style(local_time(&note.timestamp)).dim(), note.content);
        }
    }
    Ok(())
}

pub fn update(
    root: &Path,
    id: &str,
    summary: Option<&str>,
    tags: Option<&[String]>,
    method: Option<&str>,
) -> Result<()> {
    if summary.is_none() && tags.is_none() && method.is_none() {
        bail!("Nothing to update. Pass --summary, --tags or --method.");
    }
    let store = open_store(root)?;
    let ctx = store.update(id, summary, tags, method)?;
    print_changed("Updated", &ctx);
    Ok(())
}

pub fn complete(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.complete(id)?;
    print_changed("Completed", &ctx);
    println!("  Folder: {}", store.layout().relative(&ctx.folder));
    Ok(())
}

pub fn reopen(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.reopen(id)?;
    print_changed("Reopened", &ctx);
    Ok(())
}

pub fn archive(root: &Path, id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.archive(id)?;
    print_changed("Archived", &ctx);
    println!("  Folder: {}", store.layout().relative(&ctx.folder));
    Ok(())
}

fn parse_status(raw: &str) -> Result<ContextStatus> {
    match raw {
        "active" => Ok(ContextStatus::Active),
        "completed" => Ok(ContextStatus::Completed),
        other => bail!("Unknown status '{other}' (expected active or completed)"),
    }
}
