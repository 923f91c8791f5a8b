//! Raw event log inspection.

use super::{local_time, open_store};
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn run(root: &Path, id: &str, json: bool) -> Result<()> {
    let store = open_store(root)?;
    let events = store.events(id)?;

    for event in &events {
        if json {
            print!("{}", event.to_line()?);
            continue;
        }
        let mut fields = serde_json::to_value(&event.kind)?;
        if let Some(map) = fields.as_object_mut() {
            map.remove("event");
        }
        let details = match fields.as_object() {
            Some(map) if map.is_empty() => String::new(),
            _ => fields.to_string(),
        };
        println!(
            "{}  {:<28} {}",
            style(local_time(&event.timestamp)).dim(),
            style(event.kind.name()).cyan(),
            details
        );
    }
    Ok(())
}
