//! Command surface of the seed engine.
//!
//! The engine owns the catalog, the drivers and the event bus, and keeps one
//! [`SeedController`] per seed that has been loaded. Seeds are loaded on
//! first use (`start_seed`, `restart_object`, ...) rather than on startup.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::catalog::SeedCatalog;
use crate::config::JobPolicy;
use crate::drivers::Drivers;
use crate::error::JobOutcome;
use crate::events::{EngineEvent, EventBus};
use crate::job::JobHandle;
use crate::seed::SeedController;
use crate::store::{SearchHit, Seed, SeedId, SeedObject, SeedStore};

pub struct SeedEngine {
    catalog: SeedCatalog,
    drivers: Drivers,
    policy: JobPolicy,
    events: EventBus,
    seeds: Mutex<HashMap<SeedId, Arc<SeedController>>>,
}

impl SeedEngine {
    pub fn new(store: SeedStore, drivers: Drivers, policy: JobPolicy, events: EventBus) -> Self {
        Self {
            catalog: SeedCatalog::new(store),
            drivers,
            policy,
            events,
            seeds: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &SeedCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Register a seed and record its manifest. Nothing is started.
    ///
    /// A manifest that cannot be fetched yet is logged and retried when the
    /// seed is first loaded.
    pub async fn add_seed(&self, dag_cid: &str) -> Result<Seed> {
        let seed = self.catalog.seed_add(dag_cid).await?;
        if self.catalog.seed_entries(seed.id).await?.is_empty() {
            match self.drivers.manifests.load(&seed.dag_cid).await {
                Ok(manifest) => {
                    let entries = self.catalog.record_manifest(seed.id, &manifest).await?;
                    tracing::info!(seed_id = seed.id, objects = entries.len(), "manifest recorded");
                }
                Err(e) => tracing::warn!(seed_id = seed.id, "manifest not available yet: {:#}", e),
            }
        }
        self.events.emit(EngineEvent::SeedAdded {
            seed_id: seed.id,
            dag_cid: seed.dag_cid.clone(),
        });
        Ok(seed)
    }

    async fn loaded(&self, seed_id: SeedId) -> Option<Arc<SeedController>> {
        self.seeds.lock().await.get(&seed_id).cloned()
    }

    async fn controller_for(&self, seed_id: SeedId) -> Result<Arc<SeedController>> {
        let mut seeds = self.seeds.lock().await;
        if let Some(ctrl) = seeds.get(&seed_id) {
            return Ok(Arc::clone(ctrl));
        }
        let seed = self
            .catalog
            .seed_get(seed_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("unknown seed {}", seed_id))?;
        let ctrl = Arc::new(SeedController::new(
            seed,
            self.catalog.store().clone(),
            self.drivers.clone(),
            self.policy.clone(),
            self.events.clone(),
        ));
        seeds.insert(seed_id, Arc::clone(&ctrl));
        Ok(ctrl)
    }

    /// Load a seed and start every object that is not ignored.
    pub async fn start_seed(&self, seed_id: SeedId) -> Result<usize> {
        let ctrl = self.controller_for(seed_id).await?;
        ctrl.lazy_load().await
    }

    /// Start every visible seed. A seed that fails to load is logged and skipped.
    pub async fn start_all(&self) -> Result<usize> {
        let mut started = 0;
        for seed in self.catalog.seeds_all().await? {
            match self.start_seed(seed.id).await {
                Ok(n) => started += n,
                Err(e) => tracing::warn!(seed_id = seed.id, "could not start seed: {:#}", e),
            }
        }
        Ok(started)
    }

    /// Change an object's request flags; a loaded seed restarts the object's
    /// job so it picks the change up.
    pub async fn configure_object(
        &self,
        seed_id: SeedId,
        obj_index: i64,
        pin: bool,
        download: bool,
    ) -> Result<SeedObject> {
        self.require_object(seed_id, obj_index).await?;
        let row = self
            .catalog
            .seed_config_object(seed_id, obj_index, pin, download)
            .await?;
        self.reconfigure_object(seed_id, obj_index).await?;
        Ok(row)
    }

    /// Fail unless the seed is registered and its recorded manifest has an
    /// entry at `obj_index`. Creates no rows.
    pub async fn require_object(&self, seed_id: SeedId, obj_index: i64) -> Result<()> {
        if self.catalog.seed_get(seed_id).await?.is_none() {
            anyhow::bail!("unknown seed {}", seed_id);
        }
        let entries = self.catalog.seed_entries(seed_id).await?;
        if entries.is_empty() {
            anyhow::bail!("manifest of seed {} is not recorded yet", seed_id);
        }
        if !entries.iter().any(|e| e.obj_index == obj_index) {
            anyhow::bail!("seed {} has no object {}", seed_id, obj_index);
        }
        Ok(())
    }

    /// Make every job of a loaded seed pick up its persisted config. Unloaded
    /// seeds read their rows when they are next started.
    pub async fn reconfigure_seed(&self, seed_id: SeedId) -> Result<()> {
        match self.loaded(seed_id).await {
            Some(ctrl) => ctrl.reconfigure_all().await,
            None => {
                self.events.emit(EngineEvent::SeedReconfigured { seed_id });
                Ok(())
            }
        }
    }

    /// Make a loaded object's job pick up its persisted config: ignored
    /// objects are stopped, others restarted. Unloaded seeds read the row
    /// when they are next started.
    pub async fn reconfigure_object(&self, seed_id: SeedId, obj_index: i64) -> Result<()> {
        if let Some(ctrl) = self.loaded(seed_id).await {
            let row = self.catalog.seed_get_object(seed_id, obj_index).await?;
            if row.ignore {
                ctrl.cancel_object(obj_index).await?;
            } else {
                ctrl.reconfigure_object(obj_index).await?;
            }
        }
        self.events.emit(EngineEvent::SeedReconfigured { seed_id });
        Ok(())
    }

    /// Mark an object ignored (stopping its job) or bring it back.
    pub async fn set_object_ignore(&self, seed_id: SeedId, obj_index: i64, ignore: bool) -> Result<SeedObject> {
        self.require_object(seed_id, obj_index).await?;
        let row = self
            .catalog
            .seed_object_set_ignore(seed_id, obj_index, ignore)
            .await?;
        self.reconfigure_object(seed_id, obj_index).await?;
        Ok(row)
    }

    /// Stop a seed's jobs and delete it. Returns false if it was not registered.
    pub async fn remove_seed(&self, dag_cid: &str) -> Result<bool> {
        let Some(seed) = self.catalog.seed_by_cid(dag_cid).await? else {
            return Ok(false);
        };
        let ctrl = self.seeds.lock().await.remove(&seed.id);
        let removed = match ctrl {
            Some(ctrl) => ctrl.remove().await?,
            None => self.catalog.seed_delete(&seed.dag_cid).await?,
        };
        if removed {
            tracing::info!(seed_id = seed.id, dag_cid = %seed.dag_cid, "seed removed");
            self.events.emit(EngineEvent::SeedRemoved {
                dag_cid: seed.dag_cid,
            });
        }
        Ok(removed)
    }

    /// Stop an object's job. `None` if nothing was running for it.
    pub async fn cancel_object(&self, seed_id: SeedId, obj_index: i64) -> Result<Option<JobOutcome>> {
        match self.loaded(seed_id).await {
            Some(ctrl) => ctrl.cancel_object(obj_index).await,
            None => Ok(None),
        }
    }

    /// Start one object's job, loading its seed without starting the others.
    pub async fn restart_object(&self, seed_id: SeedId, obj_index: i64) -> Result<JobHandle> {
        let ctrl = self.controller_for(seed_id).await?;
        ctrl.restart_object(obj_index).await
    }

    pub async fn list_seeds(&self) -> Result<Vec<Seed>> {
        self.catalog.seeds_all().await
    }

    pub async fn search_seeds(&self, pattern: &str, date_from: i64, date_to: i64) -> Result<Vec<SearchHit>> {
        self.catalog
            .seed_objects_search(pattern, date_from, date_to)
            .await
    }

    pub async fn seed_objects(&self, seed_id: SeedId) -> Result<Vec<SeedObject>> {
        self.catalog.seed_objects(seed_id).await
    }

    /// Jobs of `seed_id` inside a pin or download phase right now.
    pub async fn active_jobs(&self, seed_id: SeedId) -> usize {
        match self.loaded(seed_id).await {
            Some(ctrl) => ctrl.active_jobs(),
            None => 0,
        }
    }

    fn snapshot(seeds: &HashMap<SeedId, Arc<SeedController>>) -> Vec<Arc<SeedController>> {
        seeds.values().cloned().collect()
    }

    /// Wait until every running job of every loaded seed has ended.
    pub async fn wait_idle(&self) {
        let all = Self::snapshot(&*self.seeds.lock().await);
        for ctrl in all {
            ctrl.wait_all().await;
        }
    }

    /// Stop every job and unload every seed. Persisted progress is kept.
    pub async fn shutdown(&self) {
        let all: Vec<_> = self.seeds.lock().await.drain().map(|(_, c)| c).collect();
        for ctrl in all {
            ctrl.stop_all().await;
        }
        tracing::info!("engine stopped");
    }
}
