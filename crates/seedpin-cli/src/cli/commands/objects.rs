//! `seedpin objects <seed-id>` – per-object pin/download state.

use anyhow::Result;
use seedpin_core::store::{SeedEntry, SeedObject};
use seedpin_core::SeedEngine;
use std::collections::HashMap;

use super::configure::require_seed;

/// `want/have` rendering of one aspect: `-` not requested, `yes` achieved, `no` pending.
fn aspect(requested: bool, achieved: bool) -> &'static str {
    match (requested, achieved) {
        (_, true) => "yes",
        (true, false) => "no",
        (false, false) => "-",
    }
}

fn render(obj: &SeedObject, entry: Option<&SeedEntry>) -> String {
    let name = entry.map(|e| e.name.as_str()).unwrap_or("?");
    let mut line = format!(
        "{:<5} {:<10} {:<7} {:<8} {:<6} {}",
        obj.obj_index,
        obj.status.as_str(),
        aspect(obj.pin, obj.pinned),
        aspect(obj.download, obj.downloaded),
        if obj.ignore { "yes" } else { "" },
        name
    );
    if let Some(path) = &obj.downloaded_to {
        line.push_str(&format!(" -> {}", path));
    }
    line
}

pub async fn run_objects(engine: &SeedEngine, seed_id: i64) -> Result<()> {
    require_seed(engine, seed_id).await?;
    let entries: HashMap<i64, SeedEntry> = engine
        .catalog()
        .seed_entries(seed_id)
        .await?
        .into_iter()
        .map(|e| (e.obj_index, e))
        .collect();
    let objects = engine.seed_objects(seed_id).await?;
    if objects.is_empty() {
        println!("Seed {} has no objects yet ({} in manifest).", seed_id, entries.len());
        return Ok(());
    }
    println!(
        "{:<5} {:<10} {:<7} {:<8} {:<6} {}",
        "INDEX", "STATUS", "PINNED", "DOWNLOAD", "IGNORE", "NAME"
    );
    for obj in &objects {
        println!("{}", render(obj, entries.get(&obj.obj_index)));
    }
    Ok(())
}
