//! CLI for the seedpin engine.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use seedpin_core::config::{self, SeedpinConfig};
use seedpin_core::drivers::Drivers;
use seedpin_core::events::EventBus;
use seedpin_core::kubo::KuboClient;
use seedpin_core::store::SeedStore;
use seedpin_core::SeedEngine;
use std::sync::Arc;

use commands::{
    run_add, run_cancel, run_configure, run_engine, run_hide, run_ignore, run_list, run_objects,
    run_remove, run_restart, run_search,
};

/// Top-level CLI for seedpin.
#[derive(Debug, Parser)]
#[command(name = "seedpin")]
#[command(about = "seedpin: pin and download the objects of content-addressed seeds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Register a seed by its DAG cid and record its manifest.
    Add {
        dag_cid: String,
    },

    /// Change what is requested for one object of a seed.
    Configure {
        seed_id: i64,
        index: i64,
        /// Keep the object pinned.
        #[arg(long, conflicts_with = "no_pin")]
        pin: bool,
        #[arg(long)]
        no_pin: bool,
        /// Download the object into the seed's directory.
        #[arg(long, conflicts_with = "no_download")]
        download: bool,
        #[arg(long)]
        no_download: bool,
    },

    /// Stop every job of a seed and delete it.
    Remove {
        dag_cid: String,
    },

    /// Cancel one object's job in a running `seedpin run`.
    Cancel {
        seed_id: i64,
        index: i64,
    },

    /// Restart one object's job (or queue it for the next run).
    Restart {
        seed_id: i64,
        index: i64,
    },

    /// Exclude an object from automatic starts, or include it again with --undo.
    Ignore {
        seed_id: i64,
        index: i64,
        #[arg(long)]
        undo: bool,
    },

    /// Hide a seed from listings and search, or show it again with --undo.
    Hide {
        seed_id: i64,
        #[arg(long)]
        undo: bool,
    },

    /// List registered seeds.
    List,

    /// Show the objects of a seed and their pin/download state.
    Objects {
        seed_id: i64,
    },

    /// Search manifest entries by name (regex, case-insensitive).
    Search {
        pattern: String,
        /// Earliest creation date (YYYY-MM-DD or RFC 3339).
        #[arg(long, value_name = "DATE")]
        from: Option<String>,
        /// Latest creation date, inclusive (YYYY-MM-DD or RFC 3339).
        #[arg(long, value_name = "DATE")]
        to: Option<String>,
    },

    /// Run the engine in the foreground until interrupted.
    Run {
        /// Only start this seed (default: every visible seed).
        #[arg(long, value_name = "SEED_ID")]
        seed: Option<i64>,
        /// Exit once every started job has ended.
        #[arg(long)]
        exit_when_done: bool,
    },
}

/// Resolve a `--flag` / `--no-flag` pair; `None` keeps the current value.
pub(crate) fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn build_engine(cfg: &SeedpinConfig, store: SeedStore) -> Result<SeedEngine> {
    let client = Arc::new(KuboClient::new(&cfg.kubo_api)?);
    let policy = cfg.job_policy()?;
    let events = EventBus::new(cfg.event_capacity.unwrap_or(256));
    Ok(SeedEngine::new(
        store,
        Drivers::from_backend(client),
        policy,
        events,
    ))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = SeedStore::open_default().await?;
        let engine = Arc::new(build_engine(&cfg, store)?);

        match cli.command {
            CliCommand::Add { dag_cid } => run_add(&engine, &dag_cid).await?,
            CliCommand::Configure {
                seed_id,
                index,
                pin,
                no_pin,
                download,
                no_download,
            } => {
                run_configure(
                    &engine,
                    seed_id,
                    index,
                    flag_pair(pin, no_pin),
                    flag_pair(download, no_download),
                )
                .await?
            }
            CliCommand::Remove { dag_cid } => run_remove(&engine, &dag_cid).await?,
            CliCommand::Cancel { seed_id, index } => run_cancel(seed_id, index).await?,
            CliCommand::Restart { seed_id, index } => run_restart(&engine, seed_id, index).await?,
            CliCommand::Ignore {
                seed_id,
                index,
                undo,
            } => run_ignore(&engine, seed_id, index, !undo).await?,
            CliCommand::Hide { seed_id, undo } => run_hide(&engine, seed_id, !undo).await?,
            CliCommand::List => run_list(&engine).await?,
            CliCommand::Objects { seed_id } => run_objects(&engine, seed_id).await?,
            CliCommand::Search { pattern, from, to } => {
                run_search(&engine, &pattern, from.as_deref(), to.as_deref()).await?
            }
            CliCommand::Run {
                seed,
                exit_when_done,
            } => run_engine(engine, seed, exit_when_done).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
