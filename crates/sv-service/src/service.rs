use std::sync::Arc;

use sv_core::config::EngineConfig;
use sv_core::error::Result;
use sv_core::types::{CollectionName, ProjectId};
use sv_vectordb::{ProjectDirectory, ShardedVectorStore};
use tracing::info;

use crate::ports::{ProjectStoragePort, VectorStoragePort};
use crate::usecases::{
    AddVector, BatchAddVectors, BatchDeleteVectors, CreateCollection, CreateProject, DeleteVector,
    GetCollectionInfo, GetProject, ListCollections, ListProjects, SearchVectors,
};

/// Every use case wired over one pair of storage ports.
pub struct VdbService {
    pub create_project: CreateProject,
    pub list_projects: ListProjects,
    pub get_project: GetProject,
    pub create_collection: CreateCollection,
    pub list_collections: ListCollections,
    pub get_collection_info: GetCollectionInfo,
    pub add_vector: AddVector,
    pub batch_add_vectors: BatchAddVectors,
    pub search_vectors: SearchVectors,
    pub delete_vector: DeleteVector,
    pub batch_delete_vectors: BatchDeleteVectors,
    vectors: Arc<dyn VectorStoragePort>,
}

impl VdbService {
    pub fn new(
        projects: Arc<dyn ProjectStoragePort>,
        vectors: Arc<dyn VectorStoragePort>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            create_project: CreateProject::new(projects.clone()),
            list_projects: ListProjects::new(projects.clone()),
            get_project: GetProject::new(projects.clone()),
            create_collection: CreateCollection::new(
                vectors.clone(),
                projects.clone(),
                config.collections.clone(),
            ),
            list_collections: ListCollections::new(vectors.clone(), projects.clone()),
            get_collection_info: GetCollectionInfo::new(vectors.clone(), projects.clone()),
            add_vector: AddVector::new(vectors.clone(), projects.clone()),
            batch_add_vectors: BatchAddVectors::new(vectors.clone(), projects.clone()),
            search_vectors: SearchVectors::new(
                vectors.clone(),
                projects.clone(),
                config.search.clone(),
            ),
            delete_vector: DeleteVector::new(vectors.clone(), projects.clone()),
            batch_delete_vectors: BatchDeleteVectors::new(vectors.clone(), projects),
            vectors,
        }
    }

    /// Open the on-disk stores under `config.storage.base_path`.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        let base = config.storage.base_path.clone();
        let projects = ProjectDirectory::open(&base).await?;
        let vectors = ShardedVectorStore::open(&base, &config.search).await?;
        info!(
            base = %base.display(),
            shard_timeout_ms = config.search.shard_timeout_ms,
            "vector service ready"
        );
        Ok(Self::new(Arc::new(projects), Arc::new(vectors), &config))
    }

    /// Drop tombstoned records from one collection.
    pub async fn purge_deleted(&self, project_id: &str, collection: &str) -> Result<usize> {
        let pid = ProjectId::new(project_id)?;
        let name = CollectionName::new(collection)?;
        self.vectors.purge_deleted(&pid, &name).await
    }

    /// Flush and release every open shard handle.
    pub fn shutdown(&self) {
        self.vectors.close();
    }
}
