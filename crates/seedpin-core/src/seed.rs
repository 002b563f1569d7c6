//! Per-seed coordination: one [`ObjectJobController`] per manifest entry.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::config::JobPolicy;
use crate::drivers::{Drivers, SeedManifest};
use crate::error::{JobError, JobOutcome};
use crate::events::{EngineEvent, EventBus};
use crate::job::{ActivityCounter, JobContext, JobHandle, ObjectJobController, ObjectTarget};
use crate::store::{Seed, SeedEntry, SeedId, SeedStore};

/// Convert a manifest into store entries; `obj_index` is the manifest position.
pub fn manifest_entries(seed_id: SeedId, manifest: &SeedManifest) -> Vec<SeedEntry> {
    manifest
        .objects
        .iter()
        .enumerate()
        .map(|(i, o)| SeedEntry {
            seed_id,
            obj_index: i as i64,
            name: o.name.clone(),
            path: o.path.clone(),
            size: o.size.map(|s| s as i64),
            date_created: o.date_created,
        })
        .collect()
}

pub struct SeedController {
    seed: Seed,
    ctx: Arc<JobContext>,
    controllers: RwLock<BTreeMap<i64, Arc<ObjectJobController>>>,
}

impl SeedController {
    pub fn new(seed: Seed, store: SeedStore, drivers: Drivers, policy: JobPolicy, events: EventBus) -> Self {
        let activity = ActivityCounter::new(seed.id, events.clone());
        let ctx = JobContext {
            store,
            drivers,
            policy,
            events,
            activity,
        };
        Self {
            seed,
            ctx: Arc::new(ctx),
            controllers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Number of this seed's jobs currently pinning or downloading.
    pub fn active_jobs(&self) -> usize {
        self.ctx.activity.current()
    }

    /// The recorded manifest, fetched through the manifest source the first time.
    pub async fn entries(&self) -> Result<Vec<SeedEntry>> {
        let entries = self.ctx.store.list_entries(self.seed.id).await?;
        if !entries.is_empty() {
            return Ok(entries);
        }
        let manifest = self
            .ctx
            .drivers
            .manifests
            .load(&self.seed.dag_cid)
            .await
            .with_context(|| format!("load manifest of {}", self.seed.dag_cid))?;
        let entries = manifest_entries(self.seed.id, &manifest);
        self.ctx.store.record_entries(self.seed.id, &entries).await?;
        Ok(entries)
    }

    /// Build a controller for every manifest entry (creating object rows as
    /// needed) without starting anything. Returns the number of controllers.
    pub async fn load(&self) -> Result<usize> {
        let entries = self.entries().await?;
        let dest_dir = self.ctx.policy.download_dir.join(&self.seed.dag_cid);
        let mut controllers = self.controllers.write().await;
        for entry in entries {
            self.ctx
                .store
                .get_or_create_object(self.seed.id, entry.obj_index)
                .await?;
            controllers.entry(entry.obj_index).or_insert_with(|| {
                let target = ObjectTarget {
                    seed_id: self.seed.id,
                    obj_index: entry.obj_index,
                    path: entry.path.clone(),
                    name: entry.name.clone(),
                    dest_dir: dest_dir.clone(),
                };
                Arc::new(ObjectJobController::new(Arc::clone(&self.ctx), target))
            });
        }
        Ok(controllers.len())
    }

    /// Load every controller and start each object that is not ignored.
    /// Returns how many jobs were started.
    pub async fn lazy_load(&self) -> Result<usize> {
        self.load().await?;
        let objects = self.ctx.store.list_objects(self.seed.id).await?;
        let controllers = self.controllers.read().await;
        let mut started = 0;
        for obj in objects {
            if obj.ignore {
                continue;
            }
            let Some(ctrl) = controllers.get(&obj.obj_index) else {
                continue;
            };
            match ctrl.start().await {
                Ok(_) => started += 1,
                Err(JobError::AlreadyRunning) => {}
                Err(e) => tracing::warn!(seed_id = self.seed.id, obj_index = obj.obj_index, "start: {}", e),
            }
        }
        tracing::info!(seed_id = self.seed.id, started, "seed loaded");
        Ok(started)
    }

    pub async fn controller(&self, obj_index: i64) -> Option<Arc<ObjectJobController>> {
        self.controllers.read().await.get(&obj_index).cloned()
    }

    async fn require(&self, obj_index: i64) -> Result<Arc<ObjectJobController>> {
        if let Some(ctrl) = self.controller(obj_index).await {
            return Ok(ctrl);
        }
        self.load().await?;
        self.controller(obj_index)
            .await
            .ok_or_else(|| anyhow::anyhow!("seed {} has no object {}", self.seed.id, obj_index))
    }

    fn snapshot(controllers: &BTreeMap<i64, Arc<ObjectJobController>>) -> Vec<Arc<ObjectJobController>> {
        controllers.values().cloned().collect()
    }

    /// Stop every job concurrently and wait for all of them to unwind.
    pub async fn stop_all(&self) {
        let all = Self::snapshot(&*self.controllers.read().await);
        let mut set = JoinSet::new();
        for ctrl in all {
            set.spawn(async move { ctrl.stop().await });
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::warn!(seed_id = self.seed.id, "stop task join: {}", e);
            }
        }
    }

    /// Restart every non-ignored job so it re-reads its config.
    pub async fn reconfigure_all(&self) -> Result<()> {
        let objects = self.ctx.store.list_objects(self.seed.id).await?;
        let controllers = self.controllers.read().await;
        let mut set = JoinSet::new();
        for obj in objects {
            let Some(ctrl) = controllers.get(&obj.obj_index).cloned() else {
                continue;
            };
            if obj.ignore {
                set.spawn(async move {
                    ctrl.stop().await;
                    Ok(())
                });
            } else {
                set.spawn(async move { ctrl.reconfigure().await.map(|_| ()) });
            }
        }
        drop(controllers);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(seed_id = self.seed.id, "reconfigure: {}", e),
                Err(e) => tracing::warn!(seed_id = self.seed.id, "reconfigure task join: {}", e),
            }
        }
        self.ctx
            .events
            .emit(EngineEvent::SeedReconfigured { seed_id: self.seed.id });
        Ok(())
    }

    pub async fn cancel_object(&self, obj_index: i64) -> Result<Option<JobOutcome>> {
        let ctrl = self.require(obj_index).await?;
        Ok(ctrl.stop().await)
    }

    pub async fn restart_object(&self, obj_index: i64) -> Result<JobHandle> {
        let ctrl = self.require(obj_index).await?;
        Ok(ctrl.start().await?)
    }

    pub async fn reconfigure_object(&self, obj_index: i64) -> Result<JobHandle> {
        let ctrl = self.require(obj_index).await?;
        Ok(ctrl.reconfigure().await?)
    }

    /// Wait until every running job of the seed has ended.
    pub async fn wait_all(&self) {
        let all = Self::snapshot(&*self.controllers.read().await);
        for ctrl in all {
            ctrl.wait().await;
        }
    }

    /// Stop everything, then delete the seed and all rows it owns.
    pub async fn remove(&self) -> Result<bool> {
        self.stop_all().await;
        self.controllers.write().await.clear();
        self.ctx.store.seed_delete(&self.seed.dag_cid).await
    }
}
