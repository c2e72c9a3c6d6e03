//! Domain model: identifiers, collection configuration, records and search projections.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VdbError};

/// Free-form key/value metadata attached to projects and records.
pub type Metadata = HashMap<String, Value>;

fn validate_identifier(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VdbError::validation(format!("{label} cannot be empty")));
    }
    if !value.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(VdbError::validation(format!(
            "{label} must be alphanumeric with underscores/hyphens: {value:?}"
        )));
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                validate_identifier($label, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = VdbError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = VdbError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

identifier!(
    /// Project identifier: non-empty, alphanumeric plus `_` and `-`.
    ProjectId,
    "Project ID"
);

identifier!(
    /// Collection name, validated like [`ProjectId`].
    CollectionName,
    "Collection name"
);

/// Direction in which a metric's raw scores rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Similarities: larger scores are better matches.
    HigherIsBetter,
    /// Distances: smaller scores are better matches.
    LowerIsBetter,
}

impl ScoreOrder {
    /// Orders two scores so that the better one sorts first.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::HigherIsBetter => b.total_cmp(&a),
            Self::LowerIsBetter => a.total_cmp(&b),
        }
    }
}

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine similarity, in [-1, 1].
    #[default]
    #[serde(rename = "cosine")]
    Cosine,
    /// Inner product.
    #[serde(rename = "dot", alias = "ip")]
    Dot,
    /// Euclidean distance.
    #[serde(rename = "L2", alias = "l2")]
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::L2 => "L2",
        }
    }

    pub fn score_order(&self) -> ScoreOrder {
        match self {
            Self::Cosine | Self::Dot => ScoreOrder::HigherIsBetter,
            Self::L2 => ScoreOrder::LowerIsBetter,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = VdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" | "cos" => Ok(Self::Cosine),
            "dot" | "ip" | "inner_product" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(VdbError::validation(format!(
                "unknown distance metric {other:?} (expected cosine, dot or L2)"
            ))),
        }
    }
}

/// A tenant namespace. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: ProjectId,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Project {
    pub fn new(project_id: ProjectId, metadata: Metadata) -> Self {
        Self {
            project_id,
            created_at: Utc::now(),
            metadata,
        }
    }
}

/// Immutable collection configuration, persisted as `_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: CollectionName,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub shards: usize,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl CollectionConfig {
    pub fn new(
        name: CollectionName,
        dimension: usize,
        metric: DistanceMetric,
        shards: usize,
    ) -> Result<Self> {
        let config = Self {
            name,
            dimension,
            metric,
            shards,
            description: None,
            created_at: Utc::now(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VdbError::validation("Dimension must be positive"));
        }
        if self.shards == 0 {
            return Err(VdbError::validation("Shard count must be positive"));
        }
        Ok(())
    }

    pub fn check_dimension(&self, got: usize) -> Result<()> {
        if got != self.dimension {
            return Err(VdbError::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }
}

/// A single stored vector. `deleted` marks a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VdbError::validation("Vector ID cannot be empty"));
        }
        if vector.is_empty() {
            return Err(VdbError::validation("Vector cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            vector,
            metadata: Metadata::new(),
            document: None,
            created_at: now,
            updated_at: now,
            deleted: false,
        })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_document(mut self, document: Option<String>) -> Self {
        self.document = document.filter(|d| !d.is_empty());
        self
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Caller-facing view; timestamps and the tombstone flag only when debugging.
    pub fn to_view(&self, include_debug: bool) -> Value {
        let mut view = serde_json::Map::new();
        view.insert("id".into(), Value::from(self.id.clone()));
        view.insert(
            "metadata".into(),
            Value::Object(self.metadata.clone().into_iter().collect()),
        );
        if let Some(document) = &self.document {
            view.insert("document".into(), Value::from(document.clone()));
        }
        if include_debug {
            view.insert("created_at".into(), Value::from(self.created_at.timestamp()));
            view.insert("updated_at".into(), Value::from(self.updated_at.timestamp()));
            view.insert("deleted".into(), Value::from(self.deleted));
        }
        Value::Object(view)
    }
}

/// One ranked hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// Per-shard diagnostics from a fan-out search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShardInfo {
    #[serde(rename = "shard")]
    pub shard_id: usize,
    /// Candidates this shard contributed before the merge.
    #[serde(rename = "count")]
    pub record_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl ShardInfo {
    pub fn empty(shard_id: usize) -> Self {
        Self {
            shard_id,
            ..Self::default()
        }
    }
}

/// Merged search results plus one [`ShardInfo`] per shard, ordered by shard id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub shards: Vec<ShardInfo>,
}

/// Collection statistics. `shard_counts[i]` is the live record count of shard `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: CollectionName,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub shards: usize,
    #[serde(default)]
    pub description: Option<String>,
    pub total_records: usize,
    pub shard_counts: Vec<usize>,
}

impl CollectionInfo {
    pub fn shard_count(&self, shard: usize) -> usize {
        self.shard_counts.get(shard).copied().unwrap_or(0)
    }
}
