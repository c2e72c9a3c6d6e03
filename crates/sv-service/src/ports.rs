//! Storage ports the use cases depend on.

use async_trait::async_trait;
use sv_core::error::Result;
use sv_core::types::{
    CollectionConfig, CollectionInfo, CollectionName, Metadata, Project, ProjectId, SearchOutcome,
    VectorRecord,
};

/// Project bookkeeping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectStoragePort: Send + Sync {
    /// Create a project. `Conflict` if it already exists.
    async fn create_project(&self, project_id: &ProjectId, metadata: Metadata) -> Result<Project>;

    async fn project_exists(&self, project_id: &ProjectId) -> bool;

    /// `NotFound` if the project does not exist.
    async fn get_project(&self, project_id: &ProjectId) -> Result<Project>;

    /// All project ids, sorted.
    async fn list_projects(&self) -> Result<Vec<String>>;
}

/// Sharded collection storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStoragePort: Send + Sync {
    // ===== Collection Management =====

    async fn create_collection(
        &self,
        project_id: &ProjectId,
        config: CollectionConfig,
    ) -> Result<()>;

    async fn collection_exists(&self, project_id: &ProjectId, collection: &CollectionName) -> bool;

    async fn list_collections(&self, project_id: &ProjectId) -> Result<Vec<String>>;

    async fn get_collection_info(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
    ) -> Result<CollectionInfo>;

    // ===== Vector Operations =====

    /// Returns the shard the record was written to.
    async fn add_vector(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        record: VectorRecord,
    ) -> Result<usize>;

    /// Returns each record's shard, in input order.
    async fn add_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<usize>>;

    async fn search_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        query: &[f32],
        limit: usize,
    ) -> Result<SearchOutcome>;

    /// `false` if there was no live record with that id.
    async fn delete_vector(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        id: &str,
    ) -> Result<bool>;

    /// Number of records actually deleted.
    async fn delete_vectors(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
        ids: &[String],
    ) -> Result<usize>;

    // ===== Maintenance =====

    /// Physically drop tombstoned records. Returns how many were removed.
    async fn purge_deleted(
        &self,
        project_id: &ProjectId,
        collection: &CollectionName,
    ) -> Result<usize>;

    /// Flush and release open shard handles.
    fn close(&self);
}
