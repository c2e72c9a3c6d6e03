use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::DistanceMetric;

pub const STORAGE_PATH_ENV: &str = "VDB_STORAGE_PATH";
pub const SHARD_TIMEOUT_ENV: &str = "VDB_SHARD_TIMEOUT_MS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub collections: CollectionDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Deadline for a single shard's scan during fan-out search.
    pub shard_timeout_ms: u64,
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionDefaults {
    pub metric: DistanceMetric,
    pub shards: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base_path = dirs::data_local_dir()
            .map(|dir| dir.join("shardvec"))
            .unwrap_or_else(|| PathBuf::from("./vdb_storage"));
        Self { base_path }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            shard_timeout_ms: 5_000,
            default_limit: 10,
            max_limit: 100,
        }
    }
}

impl SearchConfig {
    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            shards: 4,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `VDB_STORAGE_PATH` and `VDB_SHARD_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(STORAGE_PATH_ENV) {
            if !path.trim().is_empty() {
                config.storage.base_path = PathBuf::from(path);
            }
        }
        if let Ok(raw) = std::env::var(SHARD_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.search.shard_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {SHARD_TIMEOUT_ENV}"),
            }
        }
        config
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.storage.base_path = base_path.into();
        self
    }
}
