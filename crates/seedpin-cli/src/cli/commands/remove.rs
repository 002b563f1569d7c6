//! `seedpin remove <dag-cid>` – delete a seed and its object rows. Downloaded
//! files are left on disk.

use anyhow::Result;
use seedpin_core::SeedEngine;

pub async fn run_remove(engine: &SeedEngine, dag_cid: &str) -> Result<()> {
    if engine.remove_seed(dag_cid).await? {
        println!("Removed seed {dag_cid}");
    } else {
        println!("No seed {dag_cid}");
    }
    Ok(())
}
