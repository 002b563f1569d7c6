//! Control socket: server (during `seedpin run`) and client (for `cancel`,
//! `restart`, `configure`, `ignore`).
//! Protocol: one line per command, `<verb> <seed_id> <index>` with verb
//! `cancel`, `restart` or `reconfigure`.

use anyhow::Result;
use seedpin_core::{JobError, SeedEngine};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Cancel { seed_id: i64, index: i64 },
    Restart { seed_id: i64, index: i64 },
    Reconfigure { seed_id: i64, index: i64 },
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Cancel { seed_id, index } => write!(f, "cancel {} {}", seed_id, index),
            ControlCommand::Restart { seed_id, index } => write!(f, "restart {} {}", seed_id, index),
            ControlCommand::Reconfigure { seed_id, index } => {
                write!(f, "reconfigure {} {}", seed_id, index)
            }
        }
    }
}

/// Parse one protocol line. Malformed lines yield `None`.
pub fn parse_line(line: &str) -> Option<ControlCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let seed_id = parts.next()?.parse::<i64>().ok()?;
    let index = parts.next()?.parse::<i64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    match verb {
        "cancel" => Some(ControlCommand::Cancel { seed_id, index }),
        "restart" => Some(ControlCommand::Restart { seed_id, index }),
        "reconfigure" => Some(ControlCommand::Reconfigure { seed_id, index }),
        _ => None,
    }
}

async fn apply(engine: &SeedEngine, cmd: ControlCommand) -> Result<()> {
    match cmd {
        ControlCommand::Cancel { seed_id, index } => {
            engine.cancel_object(seed_id, index).await?;
        }
        ControlCommand::Restart { seed_id, index } => {
            if let Err(e) = engine.restart_object(seed_id, index).await {
                if e.downcast_ref::<JobError>() != Some(&JobError::AlreadyRunning) {
                    return Err(e);
                }
            }
        }
        ControlCommand::Reconfigure { seed_id, index } => {
            engine.reconfigure_object(seed_id, index).await?;
        }
    }
    Ok(())
}

/// Spawns a task that listens on `path` and applies each command line to
/// `engine`. Ignores malformed lines.
pub fn spawn_control_listener(
    engine: Arc<SeedEngine>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&engine);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let Some(cmd) = parse_line(line.trim()) else {
                                tracing::debug!("control socket: ignoring {:?}", line);
                                continue;
                            };
                            tracing::info!("control: {}", cmd);
                            if let Err(e) = apply(&engine, cmd).await {
                                tracing::warn!("control command {} failed: {:#}", cmd, e);
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one command line. Returns false when no `seedpin run` is listening.
pub async fn send_command(socket_path: &Path, cmd: ControlCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match tokio::net::UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    stream.write_all(format!("{}\n", cmd).as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

/// `send_command` against the default socket path; false if it cannot be resolved.
pub async fn notify(cmd: ControlCommand) -> Result<bool> {
    match seedpin_core::control::default_control_socket_path() {
        Ok(path) => send_command(&path, cmd).await,
        Err(_) => Ok(false),
    }
}
