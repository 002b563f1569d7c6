//! `seedpin add <dag-cid>` – register a seed.

use anyhow::Result;
use seedpin_core::SeedEngine;

pub async fn run_add(engine: &SeedEngine, dag_cid: &str) -> Result<()> {
    let seed = engine.add_seed(dag_cid).await?;
    let entries = engine.catalog().seed_entries(seed.id).await?;
    if entries.is_empty() {
        println!("Added seed {} ({}); manifest will be fetched on first run", seed.id, seed.dag_cid);
    } else {
        println!("Added seed {} ({}) with {} object(s)", seed.id, seed.dag_cid, entries.len());
    }
    Ok(())
}
