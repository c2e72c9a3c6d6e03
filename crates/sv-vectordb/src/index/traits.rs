use sv_core::error::Result;

use super::IndexSearchResult;
use crate::distance::DistanceMetric;

/// Core trait for vector index implementations.
pub trait VectorIndex: Send + Sync {
    /// Insert a vector under `id`, replacing any previous vector for it.
    fn insert(&mut self, id: &str, vector: &[f32]) -> Result<()>;

    /// Remove `id`. Returns whether it was present.
    fn delete(&mut self, id: &str) -> bool;

    /// Search for the top-k nearest vectors.
    fn search(&self, query: &[f32], top_k: usize) -> Result<IndexSearchResult>;

    fn contains(&self, id: &str) -> bool;

    /// Get the number of vectors in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;
}
