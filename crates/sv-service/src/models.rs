//! Request and response payloads for the use cases.
//!
//! Requests deserialize from the shapes callers send (optional fields fall
//! back to engine defaults); responses serialize to the JSON the transport
//! layer returns.

use serde::{Deserialize, Serialize};
use sv_core::types::{CollectionInfo, DistanceMetric, Metadata, SearchResult, ShardInfo};

pub const STATUS_OK: &str = "ok";

pub(crate) fn status_ok() -> String {
    STATUS_OK.to_string()
}

// ===== Requests =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub project_id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub dimension: usize,
    /// `cosine`, `dot` or `L2`; engine default when absent.
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub shards: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddVectorRequest {
    pub id: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub document: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_vector: Vec<f32>,
    /// Must be in `1..=max_limit`; the configured default when absent.
    #[serde(default)]
    pub limit: Option<usize>,
}

// ===== Responses =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub status: String,
    pub project_id: String,
    /// Epoch seconds.
    pub created_at: i64,
}

impl CreateProjectResponse {
    pub fn new(project_id: String, created_at: i64) -> Self {
        Self { status: status_ok(), project_id, created_at }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    pub status: String,
    pub projects: Vec<String>,
    pub count: usize,
}

impl ListProjectsResponse {
    pub fn new(projects: Vec<String>) -> Self {
        Self { status: status_ok(), count: projects.len(), projects }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub status: String,
    pub project_id: String,
    pub created_at: i64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCollectionResponse {
    pub status: String,
    pub collection: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub shards: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListCollectionsResponse {
    pub status: String,
    pub project_id: String,
    pub collections: Vec<String>,
    pub count: usize,
}

impl ListCollectionsResponse {
    pub fn new(project_id: String, collections: Vec<String>) -> Self {
        Self { status: status_ok(), project_id, count: collections.len(), collections }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfoResponse {
    pub status: String,
    #[serde(flatten)]
    pub info: CollectionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddVectorDebug {
    pub shard: usize,
    pub total_records_in_shard: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddVectorResponse {
    pub status: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<AddVectorDebug>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAddVectorsResponse {
    pub status: String,
    pub ids: Vec<String>,
    pub count: usize,
    /// Shard per id, when debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDebug {
    pub total_records: usize,
    pub shard_results: Vec<ShardInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchVectorsResponse {
    pub status: String,
    pub data: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<SearchDebug>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteVectorResponse {
    pub status: String,
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleteVectorsResponse {
    pub status: String,
    pub requested: usize,
    pub deleted: usize,
}
