use std::path::{Path, PathBuf};

use sv_core::types::{CollectionName, ProjectId};

pub const PROJECT_META_FILE: &str = "_project.json";
pub const CONFIG_FILE: &str = "_config.json";
pub const SHARD_LOG_FILE: &str = "vectors.jsonl";
const COLLECTIONS_DIR: &str = "collections";

/// Single source of truth for where projects, collections and shards live:
///
/// ```text
/// <base>/<project>/_project.json
/// <base>/<project>/collections/<name>/_config.json
/// <base>/<project>/collections/<name>/shard_<n>/vectors.jsonl
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    base: PathBuf,
}

impl StoreLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.base.join(project.as_str())
    }

    pub fn project_meta(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(PROJECT_META_FILE)
    }

    pub fn collections_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(COLLECTIONS_DIR)
    }

    pub fn collection_dir(&self, project: &ProjectId, collection: &CollectionName) -> PathBuf {
        self.collections_dir(project).join(collection.as_str())
    }

    pub fn config_path(&self, project: &ProjectId, collection: &CollectionName) -> PathBuf {
        self.collection_dir(project, collection).join(CONFIG_FILE)
    }

    pub fn shard_dir(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        shard: usize,
    ) -> PathBuf {
        self.collection_dir(project, collection).join(format!("shard_{shard}"))
    }

    pub fn shard_log(
        &self,
        project: &ProjectId,
        collection: &CollectionName,
        shard: usize,
    ) -> PathBuf {
        self.shard_dir(project, collection, shard).join(SHARD_LOG_FILE)
    }
}
