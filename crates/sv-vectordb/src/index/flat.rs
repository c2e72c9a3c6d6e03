use std::collections::HashMap;

use sv_core::error::{Result, VdbError};

use super::{ranking::TopK, traits::VectorIndex, IndexSearchResult};
use crate::distance::{self, DistanceMetric};

/// Brute-force (flat) vector index.
/// Exact nearest-neighbor search by scanning all vectors.
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    id_to_idx: HashMap<String, usize>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self::with_capacity(dimension, metric, 0)
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(dimension: usize, metric: DistanceMetric, capacity: usize) -> Self {
        Self {
            dimension,
            metric,
            ids: Vec::with_capacity(capacity),
            vectors: Vec::with_capacity(capacity),
            id_to_idx: HashMap::with_capacity(capacity),
        }
    }

    fn check_dimension(&self, got: usize) -> Result<()> {
        if got != self.dimension {
            return Err(VdbError::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&mut self, id: &str, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector.len())?;
        let mut vec = vector.to_vec();
        // Cosine vectors are stored normalized; scoring then reduces to IP.
        if self.metric == DistanceMetric::Cosine {
            distance::normalize_vector(&mut vec);
        }
        if let Some(&idx) = self.id_to_idx.get(id) {
            self.vectors[idx] = vec;
        } else {
            let idx = self.ids.len();
            self.ids.push(id.to_string());
            self.vectors.push(vec);
            self.id_to_idx.insert(id.to_string(), idx);
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> bool {
        let Some(idx) = self.id_to_idx.remove(id) else {
            return false;
        };
        // Swap-remove for O(1) deletion
        let last = self.ids.len() - 1;
        if idx != last {
            self.ids.swap(idx, last);
            self.vectors.swap(idx, last);
            self.id_to_idx.insert(self.ids[idx].clone(), idx);
        }
        self.ids.pop();
        self.vectors.pop();
        true
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<IndexSearchResult> {
        self.check_dimension(query.len())?;
        if self.ids.is_empty() || top_k == 0 {
            return Ok(IndexSearchResult::empty());
        }

        let (query_vec, effective_metric) = if self.metric == DistanceMetric::Cosine {
            let mut q = query.to_vec();
            distance::normalize_vector(&mut q);
            (q, DistanceMetric::Dot)
        } else {
            (query.to_vec(), self.metric)
        };

        let mut top = TopK::new(top_k, self.metric.score_order());
        for (id, vec) in self.ids.iter().zip(self.vectors.iter()) {
            top.push(id.as_str(), distance::compute_score(effective_metric, &query_vec, vec), ());
        }

        let mut result = IndexSearchResult::empty();
        for (id, score, ()) in top.into_sorted() {
            result.ids.push(id.to_string());
            result.scores.push(score);
        }
        Ok(result)
    }

    fn contains(&self, id: &str) -> bool {
        self.id_to_idx.contains_key(id)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
