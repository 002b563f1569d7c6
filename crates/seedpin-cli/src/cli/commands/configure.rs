//! `seedpin configure`, `seedpin ignore`, `seedpin hide` – change what is requested.
//! A running `seedpin run` is told to pick the change up.

use anyhow::Result;
use seedpin_core::SeedEngine;

use crate::cli::control_socket::{self, ControlCommand};

pub(super) async fn require_seed(engine: &SeedEngine, seed_id: i64) -> Result<()> {
    if engine.catalog().seed_get(seed_id).await?.is_none() {
        anyhow::bail!("unknown seed {}", seed_id);
    }
    Ok(())
}

pub async fn run_configure(
    engine: &SeedEngine,
    seed_id: i64,
    index: i64,
    pin: Option<bool>,
    download: Option<bool>,
) -> Result<()> {
    engine.require_object(seed_id, index).await?;
    let current = engine.catalog().seed_get_object(seed_id, index).await?;
    let pin = pin.unwrap_or(current.pin);
    let download = download.unwrap_or(current.download);
    let obj = engine.configure_object(seed_id, index, pin, download).await?;
    let live = control_socket::notify(ControlCommand::Reconfigure { seed_id, index }).await?;
    println!(
        "Seed {} object {}: pin={} download={} ({}){}",
        seed_id,
        index,
        obj.pin,
        obj.download,
        obj.status.as_str(),
        if live { ", running engine notified" } else { "" }
    );
    Ok(())
}

pub async fn run_ignore(engine: &SeedEngine, seed_id: i64, index: i64, ignore: bool) -> Result<()> {
    engine.set_object_ignore(seed_id, index, ignore).await?;
    control_socket::notify(ControlCommand::Reconfigure { seed_id, index }).await?;
    if ignore {
        println!("Seed {} object {} ignored", seed_id, index);
    } else {
        println!("Seed {} object {} no longer ignored", seed_id, index);
    }
    Ok(())
}

pub async fn run_hide(engine: &SeedEngine, seed_id: i64, hidden: bool) -> Result<()> {
    require_seed(engine, seed_id).await?;
    engine.catalog().seed_set_hidden(seed_id, hidden).await?;
    println!("Seed {} {}", seed_id, if hidden { "hidden" } else { "visible" });
    Ok(())
}
