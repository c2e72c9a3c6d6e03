//! Lazily opened, explicitly closed shard handles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sv_core::error::{Result, VdbError};
use sv_core::types::{CollectionConfig, CollectionName, ProjectId};
use tracing::{debug, warn};

use crate::shard::ShardTable;
use crate::store::StoreLayout;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    pub project: ProjectId,
    pub collection: CollectionName,
    pub shard: usize,
}

impl ShardKey {
    pub fn new(project: &ProjectId, collection: &CollectionName, shard: usize) -> Self {
        Self {
            project: project.clone(),
            collection: collection.clone(),
            shard,
        }
    }
}

/// The only place shard handles are opened. One [`ShardTable`] per key, shared
/// through `Arc` until closed.
///
/// Replaying a log happens outside the handle map's lock. Concurrent opens of
/// the same key serialize on a per-key slot in `opening`; other keys are never
/// held up by it.
pub struct ShardRegistry {
    layout: StoreLayout,
    shards: RwLock<HashMap<ShardKey, Arc<ShardTable>>>,
    opening: Mutex<HashMap<ShardKey, Arc<Mutex<()>>>>,
}

impl ShardRegistry {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            shards: RwLock::new(HashMap::new()),
            opening: Mutex::new(HashMap::new()),
        }
    }

    /// An already open handle.
    pub fn get(&self, key: &ShardKey) -> Option<Arc<ShardTable>> {
        self.shards.read().get(key).cloned()
    }

    /// Open (replaying the log) or return the cached handle for `key`.
    pub fn get_or_open(
        &self,
        key: &ShardKey,
        config: &CollectionConfig,
    ) -> Result<Arc<ShardTable>> {
        if key.shard >= config.shards {
            return Err(VdbError::validation(format!(
                "shard {} out of range for collection {} with {} shards",
                key.shard, config.name, config.shards
            )));
        }
        if let Some(table) = self.get(key) {
            return Ok(table);
        }

        let slot = self.opening_slot(key);
        let opened = {
            let _opening = slot.lock();
            // Another caller may have opened it while we waited for the slot.
            match self.get(key) {
                Some(table) => Ok(table),
                None => self.open_table(key, config),
            }
        };
        self.release_slot(key, &slot);
        opened
    }

    fn open_table(&self, key: &ShardKey, config: &CollectionConfig) -> Result<Arc<ShardTable>> {
        let dir = self.layout.shard_dir(&key.project, &key.collection, key.shard);
        let table = Arc::new(ShardTable::open(
            key.shard,
            &dir,
            config.dimension,
            config.metric,
        )?);
        debug!(
            project = %key.project,
            collection = %key.collection,
            shard = key.shard,
            "opened shard handle"
        );
        self.shards.write().insert(key.clone(), table.clone());
        Ok(table)
    }

    fn opening_slot(&self, key: &ShardKey) -> Arc<Mutex<()>> {
        self.opening.lock().entry(key.clone()).or_default().clone()
    }

    /// Forget the slot once no other caller is waiting on it.
    fn release_slot(&self, key: &ShardKey, slot: &Arc<Mutex<()>>) {
        let mut opening = self.opening.lock();
        // One reference in the map, one held by the caller.
        if Arc::strong_count(slot) <= 2 {
            opening.remove(key);
        }
    }

    /// Like [`get_or_open`](Self::get_or_open), but `None` for a shard that has
    /// never been written, without caching anything for it.
    pub fn open_existing(
        &self,
        key: &ShardKey,
        config: &CollectionConfig,
    ) -> Result<Option<Arc<ShardTable>>> {
        if let Some(table) = self.get(key) {
            return Ok(Some(table));
        }
        let dir = self.layout.shard_dir(&key.project, &key.collection, key.shard);
        if !ShardTable::has_data(&dir) {
            return Ok(None);
        }
        self.get_or_open(key, config).map(Some)
    }

    /// Close and drop every handle of one collection. Returns how many were open.
    pub fn close_collection(&self, project: &ProjectId, collection: &CollectionName) -> usize {
        let closed: Vec<(ShardKey, Arc<ShardTable>)> = {
            let mut shards = self.shards.write();
            let keys: Vec<ShardKey> = shards
                .keys()
                .filter(|k| &k.project == project && &k.collection == collection)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|k| shards.remove(&k).map(|table| (k, table)))
                .collect()
        };
        let count = closed.len();
        for (key, table) in closed {
            close_table(&key, &table);
        }
        count
    }

    /// Close and drop every handle.
    pub fn close_all(&self) -> usize {
        let closed: Vec<(ShardKey, Arc<ShardTable>)> = self.shards.write().drain().collect();
        let count = closed.len();
        for (key, table) in closed {
            close_table(&key, &table);
        }
        count
    }

    pub fn open_count(&self) -> usize {
        self.shards.read().len()
    }
}

fn close_table(key: &ShardKey, table: &ShardTable) {
    if let Err(e) = table.close() {
        warn!(
            project = %key.project,
            collection = %key.collection,
            shard = key.shard,
            error = %e,
            "failed to flush shard on close"
        );
    }
}
