use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::DEFAULT_CHUNK_SIZE;

/// Global configuration loaded from `~/.config/seedpin/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedpinConfig {
    /// Base URL of the Kubo-compatible RPC API.
    pub kubo_api: String,
    /// Where downloaded objects land; one sub-directory per seed. Defaults to
    /// `~/.local/share/seedpin/downloads` when unset.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Bound on the initial stat call of each job.
    pub stat_timeout_secs: u64,
    /// Pin progress silence after which the job reports itself as stalled.
    /// Display only: the job keeps waiting.
    pub stall_window_secs: u64,
    /// Bound on each provider lookup.
    pub probe_timeout_secs: u64,
    /// Provider lookups stop after this many peers.
    pub probe_num_providers: u32,
    /// Minimum spacing between durable pin progress writes, in milliseconds.
    pub progress_checkpoint_ms: u64,
    /// Chunk size for downloads of objects without an explicit one.
    pub default_chunk_size: i64,
    /// Capacity of the engine event channel.
    #[serde(default)]
    pub event_capacity: Option<usize>,
}

impl Default for SeedpinConfig {
    fn default() -> Self {
        Self {
            kubo_api: "http://127.0.0.1:5001".to_string(),
            download_dir: None,
            stat_timeout_secs: 10,
            stall_window_secs: 30,
            probe_timeout_secs: 10,
            probe_num_providers: 20,
            progress_checkpoint_ms: 1000,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            event_capacity: None,
        }
    }
}

impl SeedpinConfig {
    /// Job timing policy derived from this config.
    pub fn job_policy(&self) -> Result<JobPolicy> {
        let download_dir = match &self.download_dir {
            Some(dir) => dir.clone(),
            None => default_download_dir()?,
        };
        Ok(JobPolicy {
            stat_timeout: Duration::from_secs(self.stat_timeout_secs),
            stall_window: Duration::from_secs(self.stall_window_secs.max(1)),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            probe_num_providers: self.probe_num_providers,
            progress_checkpoint: Duration::from_millis(self.progress_checkpoint_ms),
            default_chunk_size: self.default_chunk_size.max(1),
            download_dir,
        })
    }
}

/// Per-job timing and placement policy shared by every object controller.
#[derive(Debug, Clone)]
pub struct JobPolicy {
    pub stat_timeout: Duration,
    pub stall_window: Duration,
    pub probe_timeout: Duration,
    pub probe_num_providers: u32,
    pub progress_checkpoint: Duration,
    pub default_chunk_size: i64,
    pub download_dir: PathBuf,
}

impl JobPolicy {
    /// Policy with default timings rooted at `download_dir` (tests, embedding).
    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Self {
        let cfg = SeedpinConfig::default();
        Self {
            stat_timeout: Duration::from_secs(cfg.stat_timeout_secs),
            stall_window: Duration::from_secs(cfg.stall_window_secs),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
            probe_num_providers: cfg.probe_num_providers,
            progress_checkpoint: Duration::from_millis(cfg.progress_checkpoint_ms),
            default_chunk_size: cfg.default_chunk_size,
            download_dir: download_dir.into(),
        }
    }
}

fn default_download_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seedpin")?;
    Ok(xdg_dirs.get_data_home().join("downloads"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seedpin")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SeedpinConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SeedpinConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SeedpinConfig = toml::from_str(&data)?;
    Ok(cfg)
}
