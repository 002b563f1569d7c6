//! `seedpin run` – run the engine in the foreground.

use anyhow::Result;
use seedpin_core::events::EngineEvent;
use seedpin_core::SeedEngine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::control_socket;

/// Minimum spacing between printed status lines of one object.
const STATUS_INTERVAL: Duration = Duration::from_millis(500);

/// The line to print for `event`, if any. Status text is throttled per
/// object; phase changes and seed-level events always print.
fn event_line(event: &EngineEvent, last: &mut HashMap<(i64, i64), Instant>) -> Option<String> {
    match event {
        EngineEvent::ObjectPhase {
            seed_id,
            obj_index,
            phase,
        } => {
            last.remove(&(*seed_id, *obj_index));
            Some(format!("[{}/{}] {}", seed_id, obj_index, phase.as_str()))
        }
        EngineEvent::ObjectStatus {
            seed_id,
            obj_index,
            text,
        } => {
            let now = Instant::now();
            let key = (*seed_id, *obj_index);
            if last
                .get(&key)
                .is_some_and(|t| now.duration_since(*t) < STATUS_INTERVAL)
            {
                return None;
            }
            last.insert(key, now);
            Some(format!("[{}/{}] {}", seed_id, obj_index, text))
        }
        EngineEvent::ObjectProviders {
            seed_id,
            obj_index,
            providers,
        } => Some(format!("[{}/{}] {}", seed_id, obj_index, providers)),
        EngineEvent::SeedRemoved { dag_cid } => Some(format!("seed {} removed", dag_cid)),
        EngineEvent::ActiveJobsChanged { seed_id, count } => {
            Some(format!("seed {}: {} active job(s)", seed_id, count))
        }
        EngineEvent::ObjectProgress { .. }
        | EngineEvent::SeedAdded { .. }
        | EngineEvent::SeedReconfigured { .. } => None,
    }
}

pub async fn run_engine(engine: Arc<SeedEngine>, seed: Option<i64>, exit_when_done: bool) -> Result<()> {
    engine.catalog().recover_interrupted().await?;

    let socket_path = seedpin_core::control::default_control_socket_path().ok();
    let listener = match &socket_path {
        Some(path) => match control_socket::spawn_control_listener(Arc::clone(&engine), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {:#}", e);
                None
            }
        },
        None => None,
    };

    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = HashMap::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = event_line(&event, &mut last) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::debug!("progress printer skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let started = match seed {
        Some(seed_id) => engine.start_seed(seed_id).await?,
        None => engine.start_all().await?,
    };
    println!("Started {} job(s)", started);

    if exit_when_done {
        tokio::select! {
            _ = engine.wait_idle() => {}
            _ = tokio::signal::ctrl_c() => println!("Interrupted"),
        }
    } else {
        tokio::signal::ctrl_c().await?;
        println!("Interrupted");
    }

    engine.shutdown().await;
    printer.abort();
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = socket_path {
        let _ = std::fs::remove_file(path);
    }
    Ok(())
}
