//! Session binding and in-flight queries.

use super::{local_time, open_store, print_changed, styled_mode};
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn bind(root: &Path, id: &str, session_id: &str) -> Result<()> {
    let store = open_store(root)?;
    let ctx = store.bind_session(id, session_id)?;
    print_changed("Bound session to", &ctx);
    Ok(())
}

pub fn find(root: &Path, session_id: &str) -> Result<()> {
    let store = open_store(root)?;
    match store.get_by_session_id(session_id)? {
        Some(ctx) => println!("{}", ctx.id),
        None => println!("No active context bound to session {}", session_id),
    }
    Ok(())
}

pub fn in_flight(root: &Path) -> Result<()> {
    let store = open_store(root)?;
    let contexts = store.get_all_in_flight()?;
    if contexts.is_empty() {
        println!("Nothing in flight");
        return Ok(());
    }
    for ctx in &contexts {
        println!(
            "{:<32} {:<24} since {}",
            style(&ctx.id).bold(),
            styled_mode(ctx.in_flight.mode),
            ctx.in_flight
                .started_at
                .as_deref()
                .map(local_time)
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
