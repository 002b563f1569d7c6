//! Scripted in-process drivers for engine tests.
//!
//! Each content path has a [`FakeObject`] describing how stat, pin and
//! download behave. Scripts can be swapped between runs to model a store
//! whose state changes (e.g. a stalled pin that later completes).

use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seedpin_core::config::JobPolicy;
use seedpin_core::drivers::{
    progress_channel, DownloadDriver, DownloadEvent, Drivers, ManifestObject, ManifestSource,
    ObjectStat, PinDriver, PinEvent, ProgressSender, ProgressStream, ProviderLookup,
    SeedManifest, StatDriver,
};
use seedpin_core::events::EventBus;
use seedpin_core::naming::landing_path;
use seedpin_core::store::SeedStore;
use seedpin_core::SeedEngine;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub enum PinScript {
    /// Report each node count, then Done.
    Complete(Vec<u64>),
    /// Report each node count, then Failed.
    Fail(Vec<u64>, String),
    /// Report each node count, then go quiet until the stream is dropped.
    Hang(Vec<u64>),
}

#[derive(Debug, Clone)]
pub enum DownloadScript {
    Complete,
    Fail(String),
    /// Write the first half, then go quiet until the stream is dropped.
    Hang,
}

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub content: Vec<u8>,
    pub pin: PinScript,
    pub download: DownloadScript,
    pub stat_fails: bool,
    pub stat_delay: Option<Duration>,
    pub providers: u32,
}

impl Default for FakeObject {
    fn default() -> Self {
        Self {
            content: b"hello seed".to_vec(),
            pin: PinScript::Complete(vec![10, 20]),
            download: DownloadScript::Complete,
            stat_fails: false,
            stat_delay: None,
            providers: 3,
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    objects: Mutex<HashMap<String, FakeObject>>,
    manifests: Mutex<HashMap<String, SeedManifest>>,
    pub stat_calls: AtomicUsize,
    pub pin_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub manifest_calls: AtomicUsize,
}

pub fn object_path(i: usize) -> String {
    format!("/ipfs/QmObject{}", i)
}

pub fn object_name(i: usize) -> String {
    format!("object-{}.bin", i)
}

/// Content hash the fake store reports for `path`. Distinct paths get
/// distinct hashes even when they share a last segment.
pub fn content_hash(path: &str) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("QmFake{:016x}", hasher.finish())
}

/// A manifest with `n` objects created at 1000, 2000, ...
pub fn manifest(n: usize) -> SeedManifest {
    SeedManifest {
        name: "fixture".to_string(),
        objects: (0..n)
            .map(|i| ManifestObject {
                name: object_name(i),
                path: object_path(i),
                size: Some(10),
                date_created: 1000 * (i as i64 + 1),
            })
            .collect(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(self, dag_cid: &str, manifest: SeedManifest) -> Self {
        self.set_manifest(dag_cid, manifest);
        self
    }

    pub fn set_manifest(&self, dag_cid: &str, manifest: SeedManifest) {
        self.manifests
            .lock()
            .unwrap()
            .insert(dag_cid.to_string(), manifest);
    }

    pub fn set_object(&self, path: &str, object: FakeObject) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), object);
    }

    pub fn update_object(&self, path: &str, f: impl FnOnce(&mut FakeObject)) {
        let mut objects = self.objects.lock().unwrap();
        f(objects.entry(path.to_string()).or_default());
    }

    fn object(&self, path: &str) -> FakeObject {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pins(&self) -> usize {
        self.pin_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }
}

async fn hold_open<T>(tx: ProgressSender<T>) {
    while !tx.is_closed() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[async_trait]
impl StatDriver for FakeBackend {
    async fn stat(&self, path: &str) -> Result<ObjectStat> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        let obj = self.object(path);
        if let Some(delay) = obj.stat_delay {
            tokio::time::sleep(delay).await;
        }
        if obj.stat_fails {
            anyhow::bail!("merkledag: not found");
        }
        Ok(ObjectStat {
            hash: content_hash(path),
            size: obj.content.len() as u64,
            cumulative_size: obj.content.len() as u64 + 10,
            blocks: 1,
        })
    }
}

#[async_trait]
impl PinDriver for FakeBackend {
    async fn pin(&self, path: &str) -> Result<ProgressStream<PinEvent>> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.object(path).pin;
        let (tx, rx) = progress_channel(16);
        tokio::spawn(async move {
            let (steps, tail) = match script {
                PinScript::Complete(steps) => (steps, Some(PinEvent::Done)),
                PinScript::Fail(steps, msg) => (steps, Some(PinEvent::Failed(msg))),
                PinScript::Hang(steps) => (steps, None),
            };
            for nodes in steps {
                if !tx.send(PinEvent::Progress { nodes }).await {
                    return;
                }
            }
            match tail {
                Some(event) => {
                    tx.send(event).await;
                }
                None => hold_open(tx).await,
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl DownloadDriver for FakeBackend {
    async fn get(
        &self,
        path: &str,
        dest_dir: &Path,
        chunk_size: u64,
    ) -> Result<ProgressStream<DownloadEvent>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let obj = self.object(path);
        let landing: PathBuf = landing_path(dest_dir, &content_hash(path))
            .ok_or_else(|| anyhow::anyhow!("no landing path for {}", path))?;
        let (tx, rx) = progress_channel(16);
        tokio::spawn(async move {
            let total = obj.content.len() as u64;
            let chunk = chunk_size.max(1) as usize;
            let limit = match obj.download {
                DownloadScript::Hang => obj.content.len() / 2,
                _ => obj.content.len(),
            };
            let mut written = Vec::new();
            for piece in obj.content[..limit].chunks(chunk) {
                written.extend_from_slice(piece);
                let event = DownloadEvent::Progress {
                    bytes_read: written.len() as u64,
                    content_length: total,
                };
                if !tx.send(event).await {
                    return;
                }
            }
            match obj.download {
                DownloadScript::Complete => {
                    let staged = match landing.parent() {
                        Some(parent) => tokio::fs::create_dir_all(parent).await,
                        None => Ok(()),
                    };
                    if let Err(e) = staged {
                        tx.send(DownloadEvent::Failed(e.to_string())).await;
                        return;
                    }
                    if let Err(e) = tokio::fs::write(&landing, &written).await {
                        tx.send(DownloadEvent::Failed(e.to_string())).await;
                        return;
                    }
                    tx.send(DownloadEvent::Done {
                        bytes_read: total,
                        content_length: total,
                        path: landing,
                    })
                    .await;
                }
                DownloadScript::Fail(msg) => {
                    tx.send(DownloadEvent::Failed(msg)).await;
                }
                DownloadScript::Hang => hold_open(tx).await,
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl ProviderLookup for FakeBackend {
    async fn find_providers(&self, path: &str, num_providers: u32) -> Result<u32> {
        Ok(self.object(path).providers.min(num_providers))
    }
}

#[async_trait]
impl ManifestSource for FakeBackend {
    async fn load(&self, dag_cid: &str) -> Result<SeedManifest> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .lock()
            .unwrap()
            .get(dag_cid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no manifest for {}", dag_cid))
    }
}

/// Fast timings for tests: short stat timeout, every progress tick persisted.
pub fn fast_policy(download_dir: &Path) -> JobPolicy {
    let mut policy = JobPolicy::with_download_dir(download_dir);
    policy.stat_timeout = Duration::from_millis(300);
    policy.stall_window = Duration::from_millis(200);
    policy.probe_timeout = Duration::from_millis(200);
    policy.progress_checkpoint = Duration::ZERO;
    policy.default_chunk_size = 4;
    policy
}

/// An engine over an on-disk database and download dir, both temporary.
pub struct Harness {
    pub engine: SeedEngine,
    pub backend: Arc<FakeBackend>,
    pub store: SeedStore,
    pub events: EventBus,
    pub download_dir: PathBuf,
    _state: TempDir,
    _downloads: TempDir,
}

pub async fn harness(backend: FakeBackend) -> Harness {
    let state = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let store = SeedStore::open_at(state.path().join("seeds.db")).await.unwrap();
    let backend = Arc::new(backend);
    let drivers = Drivers::from_backend(Arc::clone(&backend));
    let events = EventBus::new(1024);
    let policy = fast_policy(downloads.path());
    let engine = SeedEngine::new(store.clone(), drivers, policy, events.clone());
    Harness {
        engine,
        backend,
        store,
        events,
        download_dir: downloads.path().to_path_buf(),
        _state: state,
        _downloads: downloads,
    }
}

/// Poll `cond` every 10ms for up to 5s.
pub async fn eventually<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
