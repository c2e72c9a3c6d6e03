//! Domain model, error taxonomy and configuration for the sharded vector engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CollectionDefaults, EngineConfig, SearchConfig, StorageConfig};
pub use error::{ResourceKind, Result, VdbError};
pub use types::{
    CollectionConfig, CollectionInfo, CollectionName, DistanceMetric, Metadata, Project,
    ProjectId, ScoreOrder, SearchOutcome, SearchResult, ShardInfo, VectorRecord,
};
