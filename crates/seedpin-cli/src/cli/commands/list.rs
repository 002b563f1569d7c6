//! `seedpin list` – show registered seeds.

use anyhow::Result;
use seedpin_core::SeedEngine;

use super::search::format_date;

pub async fn run_list(engine: &SeedEngine) -> Result<()> {
    let seeds = engine.list_seeds().await?;
    if seeds.is_empty() {
        println!("No seeds in database.");
        return Ok(());
    }
    println!("{:<6} {:<20} {:<8} {}", "ID", "ADDED", "OBJECTS", "DAG CID");
    for s in seeds {
        let objects = engine.catalog().seed_entries(s.id).await?.len();
        println!(
            "{:<6} {:<20} {:<8} {}",
            s.id,
            format_date(s.date_added),
            objects,
            s.dag_cid
        );
    }
    Ok(())
}
