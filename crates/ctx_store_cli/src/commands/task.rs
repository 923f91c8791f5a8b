//! Task and note commands.

use super::open_store;
use anyhow::Result;
use console::style;
use ctx_store::{TaskCompletion, TaskStatus};
use std::path::Path;

pub fn add(
    root: &Path,
    id: &str,
    task_id: &str,
    subject: &str,
    description: Option<&str>,
    active_form: Option<&str>,
) -> Result<()> {
    let store = open_store(root)?;
    store.add_task(id, task_id, subject, description, active_form)?;
    println!("{} Added task {} to {}", style("✓").green(), style(task_id).bold(), id);
    Ok(())
}

pub fn start(root: &Path, id: &str, task_id: &str) -> Result<()> {
    let store = open_store(root)?;
    store.start_task(id, task_id)?;
    println!("{} Started task {}", style("→").cyan(), style(task_id).bold());
    Ok(())
}

pub fn complete(
    root: &Path,
    id: &str,
    task_id: &str,
    evidence: Option<String>,
    work_summary: Option<String>,
    files_changed: Vec<String>,
) -> Result<()> {
    let store = open_store(root)?;
    let completion = TaskCompletion {
        evidence,
        work_summary,
        files_changed,
    };
    store.complete_task(id, task_id, completion)?;
    println!("{} Completed task {}", style("✓").green(), style(task_id).bold());
    Ok(())
}

pub fn block(root: &Path, id: &str, task_id: &str, reason: Option<&str>) -> Result<()> {
    let store = open_store(root)?;
    store.block_task(id, task_id, reason)?;
    println!("{} Blocked task {}", style("⚠").yellow(), style(task_id).bold());
    if let Some(reason) = reason {
        println!("  Reason: {}", reason);
    }
    Ok(())
}

pub fn list(root: &Path, id: &str, pending_only: bool) -> Result<()> {
    let store = open_store(root)?;
    let tasks = if pending_only {
        store.pending_tasks(id)?
    } else {
        store.tasks(id)?
    };

    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }
    for task in &tasks {
        let status = match task.status {
            TaskStatus::Completed => style(task.status).green(),
            TaskStatus::InProgress => style(task.status).cyan(),
            TaskStatus::Blocked => style(task.status).yellow(),
            TaskStatus::Pending => style(task.status).dim(),
        };
        println!("{:<12} {:<12} {}", task.id, status, task.subject);
        if let Some(evidence) = &task.evidence {
            println!("  {} {}", style("evidence:").dim(), evidence);
        }
        if let Some(reason) = &task.blocked_reason {
            println!("  {} {}", style("blocked:").dim(), reason);
        }
    }
    Ok(())
}

pub fn note(root: &Path, id: &str, text: &str) -> Result<()> {
    let store = open_store(root)?;
    store.add_note(id, text)?;
    println!("{} Added note to {}", style("✓").green(), style(id).bold());
    Ok(())
}
