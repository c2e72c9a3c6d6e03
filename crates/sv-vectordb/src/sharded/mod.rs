//! Sharded vector store: routes writes to one shard by id and fans searches
//! out to every shard of a collection.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sv_core::config::SearchConfig;
use sv_core::error::{ResourceKind, Result, VdbError};
use sv_core::types::{
    CollectionConfig, CollectionInfo, CollectionName, ProjectId, SearchOutcome, SearchResult,
    ShardInfo, VectorRecord,
};
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::index::TopK;
use crate::registry::{ShardKey, ShardRegistry};
use crate::sharding::{HashSharding, ShardingStrategy};
use crate::store::{create_new_json, read_json, StoreLayout, CONFIG_FILE};

type ConfigKey = (ProjectId, CollectionName);

pub struct ShardedVectorStore {
    layout: StoreLayout,
    sharding: Arc<dyn ShardingStrategy>,
    registry: Arc<ShardRegistry>,
    configs: RwLock<HashMap<ConfigKey, Arc<CollectionConfig>>>,
    shard_timeout: Duration,
}

impl ShardedVectorStore {
    /// Open the store rooted at `base` with [`HashSharding`] placement.
    pub async fn open(base: impl Into<PathBuf>, search: &SearchConfig) -> Result<Self> {
        let layout = StoreLayout::new(base);
        fs::create_dir_all(layout.base()).await?;
        Ok(Self {
            registry: Arc::new(ShardRegistry::new(layout.clone())),
            layout,
            sharding: Arc::new(HashSharding),
            configs: RwLock::new(HashMap::new()),
            shard_timeout: search.shard_timeout(),
        })
    }

    /// Swap the placement strategy. Only safe before any collection is written.
    pub fn with_sharding(mut self, sharding: Arc<dyn ShardingStrategy>) -> Self {
        self.sharding = sharding;
        self
    }

    pub fn with_shard_timeout(mut self, timeout: Duration) -> Self {
        self.shard_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    pub fn sharding(&self) -> &dyn ShardingStrategy {
        self.sharding.as_ref()
    }

    // ========== Collections ==========

    /// Persist `config` and reserve one directory per shard.
    /// `Conflict` if the collection already has a `_config.json`.
    pub async fn create_collection(
        &self,
        project: &ProjectId,
        config: CollectionConfig,
    ) -> Result<()> {
        config.validate()?;
        let config_path = self.layout.config_path(project, &config.name);
        if fs::try_exists(&config_path).await? {
            return Err(VdbError::conflict(ResourceKind::Collection, config.name.as_str()));
        }
        for shard in 0..config.shards {
            fs::create_dir_all(self.layout.shard_dir(project, &config.name, shard)).await?;
        }
        if !create_new_json(&config_path, &config).await? {
            return Err(VdbError::conflict(ResourceKind::Collection, config.name.as_str()));
        }

        info!(
            project = %project,
            collection = %config.name,
            dimension = config.dimension,
            metric = %config.metric,
            shards = config.shards,
            "created collection"
        );
        self.configs
            .write()
            .insert((project.clone(), config.name.clone()), Arc::new(config));
        Ok(())
    }

    pub async fn collection_exists(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
    ) -> bool {
        if self.cached_config(project, collection).is_some() {
            return true;
        }
        fs::try_exists(self.layout.config_path(project, collection))
            .await
            .unwrap_or(false)
    }

    /// Names of the project's collections, sorted. Empty if the project has no
    /// `collections/` directory.
    pub async fn list_collections(&self, project: &ProjectId) -> Result<Vec<String>> {
        let dir = self.layout.collections_dir(project);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if !fs::try_exists(entry.path().join(CONFIG_FILE)).await? {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// The collection's config. Cached after the first read; configs never change.
    pub async fn load_config(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
    ) -> Result<Arc<CollectionConfig>> {
        if let Some(config) = self.cached_config(project, collection) {
            return Ok(config);
        }
        let config: CollectionConfig = read_json(&self.layout.config_path(project, collection))
            .await?
            .ok_or_else(|| VdbError::not_found(ResourceKind::Collection, collection.as_str()))?;
        let config = Arc::new(config);
        self.configs
            .write()
            .insert((project.clone(), collection.clone()), config.clone());
        Ok(config)
    }

    fn cached_config(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
    ) -> Option<Arc<CollectionConfig>> {
        self.configs
            .read()
            .get(&(project.clone(), collection.clone()))
            .cloned()
    }

    // ========== Writes ==========

    /// Upsert one record into the shard its id hashes to. Returns the shard id.
    pub async fn add_vector(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        record: VectorRecord,
    ) -> Result<usize> {
        let config = self.load_config(project, collection).await?;
        config.check_dimension(record.vector.len())?;

        let shard = self.sharding.compute_shard(&record.id, config.shards);
        debug!(
            project = %project,
            collection = %collection,
            shard,
            id = %record.id,
            "routing vector"
        );
        let key = ShardKey::new(project, collection, shard);
        let registry = self.registry.clone();
        run_blocking(move || registry.get_or_open(&key, &config)?.upsert(record)).await?;
        Ok(shard)
    }

    /// Upsert many records, one write per touched shard. Every dimension is
    /// checked before anything is written. Returns each record's shard id, in
    /// input order.
    pub async fn add_vectors(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<usize>> {
        let config = self.load_config(project, collection).await?;
        for record in &records {
            config.check_dimension(record.vector.len())?;
        }

        let placements: Vec<usize> = records
            .iter()
            .map(|r| self.sharding.compute_shard(&r.id, config.shards))
            .collect();
        let mut groups: BTreeMap<usize, Vec<VectorRecord>> = BTreeMap::new();
        for (record, &shard) in records.into_iter().zip(&placements) {
            groups.entry(shard).or_default().push(record);
        }
        debug!(
            project = %project,
            collection = %collection,
            records = placements.len(),
            shards = groups.len(),
            "routing vector batch"
        );

        let registry = self.registry.clone();
        let (project, collection) = (project.clone(), collection.clone());
        run_blocking(move || {
            for (shard, batch) in groups {
                let key = ShardKey::new(&project, &collection, shard);
                registry.get_or_open(&key, &config)?.upsert_batch(batch)?;
            }
            Ok(())
        })
        .await?;
        Ok(placements)
    }

    /// Tombstone `id` in its shard. `false` if there was no live record.
    pub async fn delete_vector(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        id: &str,
    ) -> Result<bool> {
        let config = self.load_config(project, collection).await?;
        let shard = self.sharding.compute_shard(id, config.shards);
        let key = ShardKey::new(project, collection, shard);
        let registry = self.registry.clone();
        let id = id.to_string();
        run_blocking(move || match registry.open_existing(&key, &config)? {
            Some(table) => table.delete(&id),
            None => Ok(false),
        })
        .await
    }

    /// Tombstone every live record among `ids`; returns how many were deleted.
    pub async fn delete_vectors(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        ids: &[String],
    ) -> Result<usize> {
        let config = self.load_config(project, collection).await?;
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for id in ids {
            groups
                .entry(self.sharding.compute_shard(id, config.shards))
                .or_default()
                .push(id.clone());
        }

        let registry = self.registry.clone();
        let (project, collection) = (project.clone(), collection.clone());
        run_blocking(move || {
            let mut deleted = 0;
            for (shard, batch) in groups {
                let key = ShardKey::new(&project, &collection, shard);
                if let Some(table) = registry.open_existing(&key, &config)? {
                    deleted += table.delete_many(&batch)?;
                }
            }
            Ok(deleted)
        })
        .await
    }

    // ========== Reads ==========

    /// The live record for `id`, if any.
    pub async fn get_vector(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        id: &str,
    ) -> Result<Option<VectorRecord>> {
        let config = self.load_config(project, collection).await?;
        let shard = self.sharding.compute_shard(id, config.shards);
        let key = ShardKey::new(project, collection, shard);
        let registry = self.registry.clone();
        let id = id.to_string();
        run_blocking(move || {
            Ok(registry
                .open_existing(&key, &config)?
                .and_then(|t| t.get(&id)))
        })
        .await
    }

    /// Query every shard concurrently and merge their candidates into the
    /// global top `limit`.
    ///
    /// Each shard scan runs on the blocking pool under the store's shard
    /// timeout. A shard that fails or misses the deadline contributes no
    /// candidates; the search itself still succeeds. `shards` in the outcome
    /// always holds one entry per shard, ordered by shard id.
    pub async fn search_vectors(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        query: &[f32],
        limit: usize,
    ) -> Result<SearchOutcome> {
        let config = self.load_config(project, collection).await?;
        config.check_dimension(query.len())?;

        let mut shards: Vec<ShardInfo> = (0..config.shards).map(ShardInfo::empty).collect();
        if limit == 0 {
            return Ok(SearchOutcome { results: Vec::new(), shards });
        }

        let query: Arc<[f32]> = Arc::from(query);
        let deadline = self.shard_timeout;
        let mut tasks = JoinSet::new();
        for shard in 0..config.shards {
            let key = ShardKey::new(project, collection, shard);
            let registry = self.registry.clone();
            let config = config.clone();
            let query = query.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let scan = tokio::task::spawn_blocking(move || -> Result<Vec<SearchResult>> {
                    match registry.open_existing(&key, &config)? {
                        Some(table) => table.search(&query, limit),
                        None => Ok(Vec::new()),
                    }
                });
                let outcome = tokio::time::timeout(deadline, scan).await;
                (shard, started.elapsed(), outcome)
            });
        }

        let mut top = TopK::new(limit, config.metric.score_order());
        while let Some(joined) = tasks.join_next().await {
            let (shard, elapsed, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(
                        project = %project,
                        collection = %collection,
                        error = %e,
                        "shard search task aborted"
                    );
                    continue;
                }
            };
            let info = &mut shards[shard];
            info.search_time_ms = Some(elapsed.as_secs_f64() * 1_000.0);
            match outcome {
                Ok(Ok(Ok(hits))) => {
                    info.record_count = hits.len();
                    for hit in hits {
                        top.push(hit.id.clone(), hit.score, hit);
                    }
                }
                Ok(Ok(Err(e))) => {
                    warn!(
                        project = %project,
                        collection = %collection,
                        shard,
                        error = %e,
                        "shard search failed; skipping shard"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        project = %project,
                        collection = %collection,
                        shard,
                        error = %e,
                        "shard scan panicked; skipping shard"
                    );
                }
                Err(_) => {
                    info.timed_out = true;
                    warn!(
                        project = %project,
                        collection = %collection,
                        shard,
                        timeout_ms = deadline.as_millis() as u64,
                        "shard search timed out; skipping shard"
                    );
                }
            }
        }

        let results = top.into_sorted().into_iter().map(|(_, _, hit)| hit).collect();
        Ok(SearchOutcome { results, shards })
    }

    /// Live counts per shard. A shard that cannot be opened counts as empty.
    pub async fn get_collection_info(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
    ) -> Result<CollectionInfo> {
        let config = self.load_config(project, collection).await?;
        let registry = self.registry.clone();
        let (p, c, cfg) = (project.clone(), collection.clone(), config.clone());
        let shard_counts = run_blocking(move || {
            Ok((0..cfg.shards)
                .map(|shard| match registry.open_existing(&ShardKey::new(&p, &c, shard), &cfg) {
                    Ok(Some(table)) => table.live_count(),
                    Ok(None) => 0,
                    Err(e) => {
                        warn!(
                            project = %p,
                            collection = %c,
                            shard,
                            error = %e,
                            "cannot open shard; counting it as empty"
                        );
                        0
                    }
                })
                .collect::<Vec<usize>>())
        })
        .await?;

        Ok(CollectionInfo {
            name: config.name.clone(),
            dimension: config.dimension,
            metric: config.metric,
            shards: config.shards,
            description: config.description.clone(),
            total_records: shard_counts.iter().sum(),
            shard_counts,
        })
    }

    // ========== Maintenance ==========

    /// Compact every written shard, dropping tombstones. Returns how many
    /// records were removed.
    pub async fn purge_deleted(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
    ) -> Result<usize> {
        let config = self.load_config(project, collection).await?;
        let registry = self.registry.clone();
        let (p, c) = (project.clone(), collection.clone());
        let removed = run_blocking(move || {
            let mut removed = 0;
            for shard in 0..config.shards {
                let key = ShardKey::new(&p, &c, shard);
                if let Some(table) = registry.open_existing(&key, &config)? {
                    removed += table.compact()?;
                }
            }
            Ok(removed)
        })
        .await?;
        info!(project = %project, collection = %collection, removed, "purged deleted vectors");
        Ok(removed)
    }

    /// Flush and drop the collection's open shard handles.
    pub fn close_collection(&self, project: &ProjectId, collection: &CollectionName) -> usize {
        self.registry.close_collection(project, collection)
    }

    /// Flush and drop every open shard handle.
    pub fn close(&self) -> usize {
        self.registry.close_all()
    }
}

impl Drop for ShardedVectorStore {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VdbError::Storage(format!("shard task failed: {e}")))?
}
