//! Outer-facing view of the seed database.

use anyhow::{Context, Result};
use regex::RegexBuilder;

use crate::drivers::SeedManifest;
use crate::seed::manifest_entries;
use crate::store::{SearchHit, Seed, SeedEntry, SeedId, SeedObject, SeedStore};

#[derive(Clone)]
pub struct SeedCatalog {
    store: SeedStore,
}

impl SeedCatalog {
    pub fn new(store: SeedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SeedStore {
        &self.store
    }

    /// Register a seed, or return the existing one for `dag_cid`.
    pub async fn seed_add(&self, dag_cid: &str) -> Result<Seed> {
        let dag_cid = dag_cid.trim();
        if dag_cid.is_empty() {
            anyhow::bail!("empty dag cid");
        }
        self.store.seed_add(dag_cid).await
    }

    pub async fn seed_get(&self, seed_id: SeedId) -> Result<Option<Seed>> {
        self.store.seed_by_id(seed_id).await
    }

    pub async fn seed_by_cid(&self, dag_cid: &str) -> Result<Option<Seed>> {
        self.store.seed_by_cid(dag_cid).await
    }

    pub async fn seed_get_object(&self, seed_id: SeedId, obj_index: i64) -> Result<SeedObject> {
        self.store.get_or_create_object(seed_id, obj_index).await
    }

    pub async fn seed_config_object(
        &self,
        seed_id: SeedId,
        obj_index: i64,
        pin: bool,
        download: bool,
    ) -> Result<SeedObject> {
        self.store
            .configure_object(seed_id, obj_index, pin, download)
            .await
    }

    /// Delete the seed and everything it owns. Returns false if it did not exist.
    pub async fn seed_delete(&self, dag_cid: &str) -> Result<bool> {
        self.store.seed_delete(dag_cid).await
    }

    pub async fn seeds_all(&self) -> Result<Vec<Seed>> {
        self.store.list_seeds(false).await
    }

    pub async fn seed_set_hidden(&self, seed_id: SeedId, hidden: bool) -> Result<()> {
        self.store.set_seed_hidden(seed_id, hidden).await
    }

    pub async fn seed_objects(&self, seed_id: SeedId) -> Result<Vec<SeedObject>> {
        self.store.list_objects(seed_id).await
    }

    pub async fn seed_object_set_ignore(
        &self,
        seed_id: SeedId,
        obj_index: i64,
        ignore: bool,
    ) -> Result<SeedObject> {
        let row = self.store.get_or_create_object(seed_id, obj_index).await?;
        self.store.set_object_ignore(row.id, ignore).await?;
        Ok(SeedObject { ignore, ..row })
    }

    /// Record (replacing) the manifest entries of a seed.
    pub async fn record_manifest(
        &self,
        seed_id: SeedId,
        manifest: &SeedManifest,
    ) -> Result<Vec<SeedEntry>> {
        let entries = manifest_entries(seed_id, manifest);
        self.store.record_entries(seed_id, &entries).await?;
        Ok(entries)
    }

    pub async fn seed_entries(&self, seed_id: SeedId) -> Result<Vec<SeedEntry>> {
        self.store.list_entries(seed_id).await
    }

    /// Manifest entries of visible seeds whose name matches `pattern`
    /// (case-insensitive) and whose creation date lies in `[date_from, date_to]`.
    pub async fn seed_objects_search(
        &self,
        pattern: &str,
        date_from: i64,
        date_to: i64,
    ) -> Result<Vec<SearchHit>> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid search pattern {:?}", pattern))?;
        if date_from > date_to {
            return Ok(Vec::new());
        }
        let hits = self.store.entries_in_window(date_from, date_to).await?;
        Ok(hits.into_iter().filter(|h| re.is_match(&h.name)).collect())
    }

    /// Reset aspect statuses left IN_PROGRESS by a previous process.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let n = self.store.recover_interrupted().await?;
        if n > 0 {
            tracing::info!(rows = n, "reset interrupted objects");
        }
        Ok(n)
    }
}
