//! One struct per capability. Each checks that the project and then the
//! collection exist, builds domain values from the caller's primitives, and
//! shapes the response. Placement and merging stay in the storage layer.

use std::sync::Arc;

use sv_core::config::{CollectionDefaults, SearchConfig};
use sv_core::error::{ResourceKind, Result, VdbError};
use sv_core::types::{
    CollectionConfig, CollectionName, DistanceMetric, Metadata, ProjectId, VectorRecord,
};
use tracing::debug;

use crate::models::{
    status_ok, AddVectorDebug, AddVectorRequest, AddVectorResponse, BatchAddVectorsResponse,
    BatchDeleteVectorsResponse, CollectionInfoResponse, CreateCollectionRequest,
    CreateCollectionResponse, CreateProjectResponse, DeleteVectorResponse, ListCollectionsResponse,
    ListProjectsResponse, ProjectResponse, SearchDebug, SearchRequest, SearchVectorsResponse,
};
use crate::ports::{ProjectStoragePort, VectorStoragePort};

async fn require_project(projects: &dyn ProjectStoragePort, project_id: &str) -> Result<ProjectId> {
    let pid = ProjectId::new(project_id)?;
    if !projects.project_exists(&pid).await {
        return Err(VdbError::not_found(ResourceKind::Project, project_id));
    }
    Ok(pid)
}

async fn require_collection(
    vectors: &dyn VectorStoragePort,
    project_id: &ProjectId,
    collection: &str,
) -> Result<CollectionName> {
    let name = CollectionName::new(collection)?;
    if !vectors.collection_exists(project_id, &name).await {
        return Err(VdbError::not_found(ResourceKind::Collection, collection));
    }
    Ok(name)
}

fn build_record(request: AddVectorRequest) -> Result<VectorRecord> {
    Ok(VectorRecord::new(request.id, request.embedding)?
        .with_metadata(request.metadata.unwrap_or_default())
        .with_document(request.document))
}

// ===== Projects =====

pub struct CreateProject {
    projects: Arc<dyn ProjectStoragePort>,
}

impl CreateProject {
    pub fn new(projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { projects }
    }

    pub async fn execute(
        &self,
        project_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<CreateProjectResponse> {
        let pid = ProjectId::new(project_id)?;
        if self.projects.project_exists(&pid).await {
            return Err(VdbError::conflict(ResourceKind::Project, project_id));
        }
        let project = self.projects.create_project(&pid, metadata.unwrap_or_default()).await?;
        Ok(CreateProjectResponse::new(
            project.project_id.to_string(),
            project.created_at.timestamp(),
        ))
    }
}

pub struct ListProjects {
    projects: Arc<dyn ProjectStoragePort>,
}

impl ListProjects {
    pub fn new(projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { projects }
    }

    pub async fn execute(&self) -> Result<ListProjectsResponse> {
        Ok(ListProjectsResponse::new(self.projects.list_projects().await?))
    }
}

pub struct GetProject {
    projects: Arc<dyn ProjectStoragePort>,
}

impl GetProject {
    pub fn new(projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { projects }
    }

    pub async fn execute(&self, project_id: &str) -> Result<ProjectResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let project = self.projects.get_project(&pid).await?;
        Ok(ProjectResponse {
            status: status_ok(),
            project_id: project.project_id.to_string(),
            created_at: project.created_at.timestamp(),
            metadata: project.metadata,
        })
    }
}

// ===== Collections =====

pub struct CreateCollection {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
    defaults: CollectionDefaults,
}

impl CreateCollection {
    pub fn new(
        vectors: Arc<dyn VectorStoragePort>,
        projects: Arc<dyn ProjectStoragePort>,
        defaults: CollectionDefaults,
    ) -> Self {
        Self { vectors, projects, defaults }
    }

    pub async fn execute(
        &self,
        project_id: &str,
        request: CreateCollectionRequest,
    ) -> Result<CreateCollectionResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = CollectionName::new(&request.name)?;
        if self.vectors.collection_exists(&pid, &name).await {
            return Err(VdbError::conflict(ResourceKind::Collection, request.name));
        }

        let metric = match request.metric.as_deref() {
            Some(raw) => raw.parse::<DistanceMetric>()?,
            None => self.defaults.metric,
        };
        let shards = request.shards.unwrap_or(self.defaults.shards);
        let config = CollectionConfig::new(name, request.dimension, metric, shards)?
            .with_description(request.description);
        let response = CreateCollectionResponse {
            status: status_ok(),
            collection: config.name.to_string(),
            dimension: config.dimension,
            metric: config.metric,
            shards: config.shards,
            description: config.description.clone(),
        };
        self.vectors.create_collection(&pid, config).await?;
        Ok(response)
    }
}

pub struct ListCollections {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl ListCollections {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    pub async fn execute(&self, project_id: &str) -> Result<ListCollectionsResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let collections = self.vectors.list_collections(&pid).await?;
        Ok(ListCollectionsResponse::new(pid.to_string(), collections))
    }
}

pub struct GetCollectionInfo {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl GetCollectionInfo {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
    ) -> Result<CollectionInfoResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        let info = self.vectors.get_collection_info(&pid, &name).await?;
        Ok(CollectionInfoResponse { status: status_ok(), info })
    }
}

// ===== Vectors =====

pub struct AddVector {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl AddVector {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
        request: AddVectorRequest,
        include_debug: bool,
    ) -> Result<AddVectorResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        let record = build_record(request)?;
        let id = record.id.clone();

        let shard = self.vectors.add_vector(&pid, &name, record).await?;
        let debug = if include_debug {
            let info = self.vectors.get_collection_info(&pid, &name).await?;
            Some(AddVectorDebug {
                shard,
                total_records_in_shard: info.shard_count(shard),
            })
        } else {
            None
        };
        Ok(AddVectorResponse { status: status_ok(), id, debug })
    }
}

pub struct BatchAddVectors {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl BatchAddVectors {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    /// All-or-nothing validation: one bad record rejects the whole batch
    /// before anything is written.
    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
        requests: Vec<AddVectorRequest>,
        include_debug: bool,
    ) -> Result<BatchAddVectorsResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        let records = requests.into_iter().map(build_record).collect::<Result<Vec<_>>>()?;
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let shards = self.vectors.add_vectors(&pid, &name, records).await?;
        debug!(project = %pid, collection = %name, count = ids.len(), "added vector batch");
        Ok(BatchAddVectorsResponse {
            status: status_ok(),
            count: ids.len(),
            ids,
            shards: include_debug.then_some(shards),
        })
    }
}

pub struct SearchVectors {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
    limits: SearchConfig,
}

impl SearchVectors {
    pub fn new(
        vectors: Arc<dyn VectorStoragePort>,
        projects: Arc<dyn ProjectStoragePort>,
        limits: SearchConfig,
    ) -> Self {
        Self { vectors, projects, limits }
    }

    fn resolve_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.limits.default_limit),
            Some(limit) if limit == 0 || limit > self.limits.max_limit => {
                Err(VdbError::validation(format!(
                    "limit must be between 1 and {}, got {limit}",
                    self.limits.max_limit
                )))
            }
            Some(limit) => Ok(limit),
        }
    }

    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
        request: SearchRequest,
        include_debug: bool,
    ) -> Result<SearchVectorsResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        let limit = self.resolve_limit(request.limit)?;

        let outcome = self
            .vectors
            .search_vectors(&pid, &name, &request.query_vector, limit)
            .await?;
        let debug = if include_debug {
            let info = self.vectors.get_collection_info(&pid, &name).await?;
            Some(SearchDebug {
                total_records: info.total_records,
                shard_results: outcome.shards,
            })
        } else {
            None
        };
        Ok(SearchVectorsResponse {
            status: status_ok(),
            data: outcome.results,
            debug,
        })
    }
}

pub struct DeleteVector {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl DeleteVector {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    /// `NotFound` if there is no live vector with that id.
    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
        vector_id: &str,
    ) -> Result<DeleteVectorResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        if !self.vectors.delete_vector(&pid, &name, vector_id).await? {
            return Err(VdbError::not_found(ResourceKind::Vector, vector_id));
        }
        Ok(DeleteVectorResponse {
            status: status_ok(),
            id: vector_id.to_string(),
            deleted: true,
        })
    }
}

pub struct BatchDeleteVectors {
    vectors: Arc<dyn VectorStoragePort>,
    projects: Arc<dyn ProjectStoragePort>,
}

impl BatchDeleteVectors {
    pub fn new(vectors: Arc<dyn VectorStoragePort>, projects: Arc<dyn ProjectStoragePort>) -> Self {
        Self { vectors, projects }
    }

    /// Unknown ids are skipped; `deleted` counts the ones that were live.
    pub async fn execute(
        &self,
        project_id: &str,
        collection: &str,
        ids: &[String],
    ) -> Result<BatchDeleteVectorsResponse> {
        let pid = require_project(self.projects.as_ref(), project_id).await?;
        let name = require_collection(self.vectors.as_ref(), &pid, collection).await?;
        let deleted = self.vectors.delete_vectors(&pid, &name, ids).await?;
        Ok(BatchDeleteVectorsResponse {
            status: status_ok(),
            requested: ids.len(),
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockProjectStoragePort, MockVectorStoragePort};
    use sv_core::types::{CollectionInfo, Project, SearchOutcome, SearchResult, ShardInfo};

    fn existing_project() -> MockProjectStoragePort {
        let mut projects = MockProjectStoragePort::new();
        projects.expect_project_exists().returning(|_| true);
        projects
    }

    fn missing_project() -> MockProjectStoragePort {
        let mut projects = MockProjectStoragePort::new();
        projects.expect_project_exists().returning(|_| false);
        projects
    }

    fn info(shard_counts: Vec<usize>) -> CollectionInfo {
        CollectionInfo {
            name: CollectionName::new("docs").unwrap(),
            dimension: 3,
            metric: DistanceMetric::Cosine,
            shards: shard_counts.len(),
            description: None,
            total_records: shard_counts.iter().sum(),
            shard_counts,
        }
    }

    fn add_request(id: &str) -> AddVectorRequest {
        AddVectorRequest {
            id: id.into(),
            embedding: vec![1.0, 0.0, 0.0],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_project_conflict() {
        let uc = CreateProject::new(Arc::new(existing_project()));
        let err = uc.execute("acme", None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_project_rejects_bad_id_before_storage() {
        let uc = CreateProject::new(Arc::new(MockProjectStoragePort::new()));
        assert!(matches!(uc.execute("bad id", None).await, Err(VdbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_project_passes_metadata() {
        let mut projects = MockProjectStoragePort::new();
        projects.expect_project_exists().returning(|_| false);
        projects
            .expect_create_project()
            .withf(|pid, meta| pid.as_str() == "acme" && meta.contains_key("team"))
            .returning(|pid, meta| Ok(Project::new(pid.clone(), meta)));

        let uc = CreateProject::new(Arc::new(projects));
        let meta = Metadata::from([("team".to_string(), serde_json::json!("search"))]);
        let resp = uc.execute("acme", Some(meta)).await.unwrap();
        assert_eq!(resp.project_id, "acme");
        assert_eq!(resp.status, "ok");
    }

    #[tokio::test]
    async fn test_list_projects() {
        let mut projects = MockProjectStoragePort::new();
        projects
            .expect_list_projects()
            .returning(|| Ok(vec!["a".into(), "b".into()]));
        let resp = ListProjects::new(Arc::new(projects)).execute().await.unwrap();
        assert_eq!(resp.projects, vec!["a", "b"]);
        assert_eq!(resp.count, 2);
    }

    #[tokio::test]
    async fn test_get_project_not_found() {
        let uc = GetProject::new(Arc::new(missing_project()));
        let err = uc.execute("ghost").await.unwrap_err();
        assert!(matches!(err, VdbError::NotFound { kind: ResourceKind::Project, .. }));
    }

    #[tokio::test]
    async fn test_create_collection_applies_defaults() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| false);
        vectors
            .expect_create_collection()
            .withf(|_, config| {
                config.metric == DistanceMetric::Cosine
                    && config.shards == 4
                    && config.dimension == 3
            })
            .returning(|_, _| Ok(()));

        let uc = CreateCollection::new(
            Arc::new(vectors),
            Arc::new(existing_project()),
            CollectionDefaults::default(),
        );
        let request = CreateCollectionRequest {
            name: "docs".into(),
            dimension: 3,
            ..Default::default()
        };
        let resp = uc.execute("acme", request).await.unwrap();
        assert_eq!(resp.collection, "docs");
        assert_eq!(resp.shards, 4);
        assert_eq!(resp.metric, DistanceMetric::Cosine);
    }

    #[tokio::test]
    async fn test_create_collection_unknown_metric() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| false);
        let uc = CreateCollection::new(
            Arc::new(vectors),
            Arc::new(existing_project()),
            CollectionDefaults::default(),
        );
        let request = CreateCollectionRequest {
            name: "docs".into(),
            dimension: 3,
            metric: Some("manhattan".into()),
            ..Default::default()
        };
        assert!(matches!(uc.execute("acme", request).await, Err(VdbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_collection_requires_project() {
        let uc = CreateCollection::new(
            Arc::new(MockVectorStoragePort::new()),
            Arc::new(missing_project()),
            CollectionDefaults::default(),
        );
        let request = CreateCollectionRequest {
            name: "docs".into(),
            dimension: 3,
            ..Default::default()
        };
        assert!(uc.execute("ghost", request).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_collection_conflict() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        let uc = CreateCollection::new(
            Arc::new(vectors),
            Arc::new(existing_project()),
            CollectionDefaults::default(),
        );
        let request = CreateCollectionRequest {
            name: "docs".into(),
            dimension: 3,
            ..Default::default()
        };
        assert!(uc.execute("acme", request).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_add_vector_requires_collection() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| false);
        let uc = AddVector::new(Arc::new(vectors), Arc::new(existing_project()));
        let err = uc.execute("acme", "ghost", add_request("v1"), false).await.unwrap_err();
        assert!(matches!(err, VdbError::NotFound { kind: ResourceKind::Collection, .. }));
    }

    #[tokio::test]
    async fn test_add_vector_debug_reports_shard() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors
            .expect_add_vector()
            .withf(|_, _, record| record.id == "v1" && record.document.is_none())
            .returning(|_, _, _| Ok(1));
        vectors
            .expect_get_collection_info()
            .returning(|_, _| Ok(info(vec![4, 7])));

        let uc = AddVector::new(Arc::new(vectors), Arc::new(existing_project()));
        let resp = uc.execute("acme", "docs", add_request("v1"), true).await.unwrap();
        assert_eq!(
            resp.debug,
            Some(AddVectorDebug { shard: 1, total_records_in_shard: 7 })
        );
    }

    #[tokio::test]
    async fn test_add_vector_surfaces_dimension_mismatch() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors
            .expect_add_vector()
            .returning(|_, _, _| Err(VdbError::DimensionMismatch { expected: 4, got: 3 }));
        let uc = AddVector::new(Arc::new(vectors), Arc::new(existing_project()));
        let err = uc.execute("acme", "docs", add_request("v1"), false).await.unwrap_err();
        assert!(matches!(err, VdbError::DimensionMismatch { expected: 4, got: 3 }));
    }

    #[tokio::test]
    async fn test_batch_add_rejects_bad_record_before_write() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors.expect_add_vectors().never();
        let uc = BatchAddVectors::new(Arc::new(vectors), Arc::new(existing_project()));
        let requests = vec![add_request("ok"), add_request("")];
        assert!(matches!(
            uc.execute("acme", "docs", requests, false).await,
            Err(VdbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_default_limit_and_debug() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors
            .expect_search_vectors()
            .withf(|_, _, _, limit| *limit == 10)
            .returning(|_, _, _, _| {
                Ok(SearchOutcome {
                    results: vec![SearchResult {
                        id: "v1".into(),
                        score: 0.9,
                        metadata: Metadata::new(),
                        document: None,
                    }],
                    shards: vec![ShardInfo::empty(0), ShardInfo::empty(1)],
                })
            });
        vectors
            .expect_get_collection_info()
            .returning(|_, _| Ok(info(vec![2, 3])));

        let uc = SearchVectors::new(
            Arc::new(vectors),
            Arc::new(existing_project()),
            SearchConfig::default(),
        );
        let request = SearchRequest { query_vector: vec![1.0, 0.0, 0.0], limit: None };
        let resp = uc.execute("acme", "docs", request, true).await.unwrap();
        assert_eq!(resp.data.len(), 1);
        let debug = resp.debug.unwrap();
        assert_eq!(debug.total_records, 5);
        assert_eq!(debug.shard_results.len(), 2);
    }

    #[tokio::test]
    async fn test_search_limit_bounds() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors.expect_search_vectors().never();
        let uc = SearchVectors::new(
            Arc::new(vectors),
            Arc::new(existing_project()),
            SearchConfig::default(),
        );

        for limit in [0, 101] {
            let request = SearchRequest { query_vector: vec![1.0], limit: Some(limit) };
            assert!(matches!(
                uc.execute("acme", "docs", request, false).await,
                Err(VdbError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_delete_missing_vector_is_not_found() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors
            .expect_delete_vector()
            .withf(|_, _, id| id == "v9")
            .returning(|_, _, _| Ok(false));
        let uc = DeleteVector::new(Arc::new(vectors), Arc::new(existing_project()));
        let err = uc.execute("acme", "docs", "v9").await.unwrap_err();
        assert!(matches!(err, VdbError::NotFound { kind: ResourceKind::Vector, .. }));
    }

    #[tokio::test]
    async fn test_delete_vector_ok() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors.expect_delete_vector().returning(|_, _, _| Ok(true));
        let uc = DeleteVector::new(Arc::new(vectors), Arc::new(existing_project()));
        let resp = uc.execute("acme", "docs", "v1").await.unwrap();
        assert!(resp.deleted);
        assert_eq!(resp.id, "v1");
    }

    #[tokio::test]
    async fn test_batch_delete_counts() {
        let mut vectors = MockVectorStoragePort::new();
        vectors.expect_collection_exists().returning(|_, _| true);
        vectors.expect_delete_vectors().returning(|_, _, ids| Ok(ids.len() - 1));
        let uc = BatchDeleteVectors::new(Arc::new(vectors), Arc::new(existing_project()));
        let ids = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        let resp = uc.execute("acme", "docs", &ids).await.unwrap();
        assert_eq!(resp.requested, 3);
        assert_eq!(resp.deleted, 2);
    }
}
