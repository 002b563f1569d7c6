//! `seedpin cancel` / `seedpin restart` – reach the jobs of a running `seedpin run`.

use anyhow::Result;
use seedpin_core::store::ObjectStatus;
use seedpin_core::SeedEngine;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_cancel(seed_id: i64, index: i64) -> Result<()> {
    if control_socket::notify(ControlCommand::Cancel { seed_id, index }).await? {
        println!("Cancel requested for seed {} object {}", seed_id, index);
    } else {
        println!("No running engine; nothing to cancel");
    }
    Ok(())
}

/// Without a running engine the object is queued for the next `seedpin run`.
pub async fn run_restart(engine: &SeedEngine, seed_id: i64, index: i64) -> Result<()> {
    if control_socket::notify(ControlCommand::Restart { seed_id, index }).await? {
        println!("Restart requested for seed {} object {}", seed_id, index);
        return Ok(());
    }
    if queue_for_next_run(engine, seed_id, index).await? {
        println!("Seed {} object {} queued for the next run", seed_id, index);
    } else {
        println!("Seed {} object {} is already finished", seed_id, index);
    }
    Ok(())
}

/// Mark the object QUEUED unless it is finished with every requested aspect
/// achieved. Returns whether the row was queued.
pub(crate) async fn queue_for_next_run(engine: &SeedEngine, seed_id: i64, index: i64) -> Result<bool> {
    engine.require_object(seed_id, index).await?;
    let obj = engine.catalog().seed_get_object(seed_id, index).await?;
    if obj.status == ObjectStatus::Finished && obj.is_satisfied() {
        return Ok(false);
    }
    engine
        .catalog()
        .store()
        .set_object_status(obj.id, ObjectStatus::Queued)
        .await?;
    Ok(true)
}
