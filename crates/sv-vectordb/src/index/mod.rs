//! Per-shard vector search primitive: an exact flat index plus top-k ranking.

mod flat;
mod ranking;
mod traits;

pub use flat::FlatIndex;
pub use ranking::TopK;
pub use traits::VectorIndex;

/// Search result: (id, score) pairs, best first under the index's metric.
#[derive(Debug, Clone, Default)]
pub struct IndexSearchResult {
    pub ids: Vec<String>,
    pub scores: Vec<f32>,
}

impl IndexSearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.ids.iter().map(String::as_str).zip(self.scores.iter().copied())
    }
}
