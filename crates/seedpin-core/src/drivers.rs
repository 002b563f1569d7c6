//! Capabilities the engine consumes from the content-addressed store.
//!
//! Pin and download report progress through a [`ProgressStream`]: a bounded
//! channel whose last element is an explicit terminal marker (`Done` or
//! `Failed`). A stream that closes without one is treated as a failure by
//! the consumer. Dropping the stream tells the producer to stop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default buffer between a driver and the job consuming its progress.
pub const PROGRESS_BUFFER: usize = 64;

/// Receiving half of a driver's progress channel.
pub struct ProgressStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> ProgressStream<T> {
    /// Next progress element; `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Producing half of a driver's progress channel.
pub struct ProgressSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for ProgressSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ProgressSender<T> {
    /// Send from async code. Returns false when the consumer dropped the stream.
    pub async fn send(&self, item: T) -> bool {
        self.tx.send(item).await.is_ok()
    }

    /// Send from a blocking thread (e.g. a curl callback inside `spawn_blocking`).
    pub fn blocking_send(&self, item: T) -> bool {
        self.tx.blocking_send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a connected sender/stream pair.
pub fn progress_channel<T>(buffer: usize) -> (ProgressSender<T>, ProgressStream<T>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ProgressSender { tx }, ProgressStream { rx })
}

/// One element of a pin progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEvent {
    /// Pinning in progress; `nodes` fetched so far.
    Progress { nodes: u64 },
    /// Terminal: the object is pinned.
    Done,
    /// Terminal: the store reported failure.
    Failed(String),
}

/// One element of a download progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Progress { bytes_read: u64, content_length: u64 },
    /// Terminal: content is complete at `path`, its landing path
    /// (see [`crate::naming::landing_path`]).
    Done {
        bytes_read: u64,
        content_length: u64,
        path: PathBuf,
    },
    /// Terminal: the transfer failed.
    Failed(String),
}

/// Metadata returned by a stat call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStat {
    pub hash: String,
    pub size: u64,
    pub cumulative_size: u64,
    pub blocks: u64,
}

/// A seed's manifest: the ordered list of objects it references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objects: Vec<ManifestObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestObject {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub date_created: i64,
}

#[async_trait]
pub trait StatDriver: Send + Sync {
    /// Fetch size/block metadata for `path`, or fail if it is unreachable.
    async fn stat(&self, path: &str) -> anyhow::Result<ObjectStat>;
}

#[async_trait]
pub trait PinDriver: Send + Sync {
    /// Start pinning `path`. Pinning is idempotent on the store side.
    async fn pin(&self, path: &str) -> anyhow::Result<ProgressStream<PinEvent>>;
}

#[async_trait]
pub trait DownloadDriver: Send + Sync {
    /// Fetch `path` in `chunk_size` pieces to its landing path under
    /// `dest_dir`. Never writes outside the staging directory.
    async fn get(
        &self,
        path: &str,
        dest_dir: &Path,
        chunk_size: u64,
    ) -> anyhow::Result<ProgressStream<DownloadEvent>>;
}

#[async_trait]
pub trait ProviderLookup: Send + Sync {
    /// Count peers currently providing `path`, stopping after `num_providers`.
    async fn find_providers(&self, path: &str, num_providers: u32) -> anyhow::Result<u32>;
}

#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Resolve a seed's manifest from its DAG cid.
    async fn load(&self, dag_cid: &str) -> anyhow::Result<SeedManifest>;
}

/// The full set of store capabilities handed to the engine.
#[derive(Clone)]
pub struct Drivers {
    pub stat: Arc<dyn StatDriver>,
    pub pin: Arc<dyn PinDriver>,
    pub download: Arc<dyn DownloadDriver>,
    pub providers: Arc<dyn ProviderLookup>,
    pub manifests: Arc<dyn ManifestSource>,
}

impl Drivers {
    /// Use one backend for every capability.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: StatDriver + PinDriver + DownloadDriver + ProviderLookup + ManifestSource + 'static,
    {
        Self {
            stat: backend.clone(),
            pin: backend.clone(),
            download: backend.clone(),
            providers: backend.clone(),
            manifests: backend,
        }
    }
}
