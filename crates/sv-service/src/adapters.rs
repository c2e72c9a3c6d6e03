//! Port implementations over the on-disk stores.

use async_trait::async_trait;
use sv_core::error::Result;
use sv_core::types::{
    CollectionConfig, CollectionInfo, CollectionName, Metadata, Project, ProjectId, SearchOutcome,
    VectorRecord,
};
use sv_vectordb::{ProjectDirectory, ShardedVectorStore};

use crate::ports::{ProjectStoragePort, VectorStoragePort};

#[async_trait]
impl ProjectStoragePort for ProjectDirectory {
    async fn create_project(&self, project_id: &ProjectId, metadata: Metadata) -> Result<Project> {
        ProjectDirectory::create_project(self, project_id, metadata).await
    }

    async fn project_exists(&self, project_id: &ProjectId) -> bool {
        ProjectDirectory::project_exists(self, project_id).await
    }

    async fn get_project(&self, project_id: &ProjectId) -> Result<Project> {
        ProjectDirectory::get_project(self, project_id).await
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        ProjectDirectory::list_projects(self).await
    }
}

#[async_trait]
impl VectorStoragePort for ShardedVectorStore {
    async fn create_collection(
        &self,
        project_id: &ProjectId,
        config: CollectionConfig,
    ) -> Result<()> {
        ShardedVectorStore::create_collection(self, project_id, config).await
    }

    async fn collection_exists(&self, project_id: &ProjectId, collection: &CollectionName) -> bool {
        ShardedVectorStore::collection_exists(self, project_id, collection).await
    }

    async fn list_collections(&self, project_id: &ProjectId) -> Result<Vec<String>> {
        ShardedVectorStore::list_collections(self, project_id).await
    }

    async fn get_collection_info(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
    ) -> Result<CollectionInfo> {
        ShardedVectorStore::get_collection_info(self, project_id, collection).await
    }

    async fn add_vector(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        record: VectorRecord,
    ) -> Result<usize> {
        ShardedVectorStore::add_vector(self, project_id, collection, record).await
    }

    async fn add_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<usize>> {
        ShardedVectorStore::add_vectors(self, project_id, collection, records).await
    }

    async fn search_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        query: &[f32],
        limit: usize,
    ) -> Result<SearchOutcome> {
        ShardedVectorStore::search_vectors(self, project_id, collection, query, limit).await
    }

    async fn delete_vector(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        id: &str,
    ) -> Result<bool> {
        ShardedVectorStore::delete_vector(self, project_id, collection, id).await
    }

    async fn delete_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        ids: &[String],
    ) -> Result<usize> {
        ShardedVectorStore::delete_vectors(self, project_id, collection, ids).await
    }

    async fn purge_deleted(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
    ) -> Result<usize> {
        ShardedVectorStore::purge_deleted(self, project_id, collection).await
    }

    fn close(&self) {
        ShardedVectorStore::close(self);
    }
}
