use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::distance::ScoreOrder;

/// Heap entry. Greater means better: higher normalized key, then smaller id.
struct Ranked<K, T> {
    key: OrderedFloat<f32>,
    id: K,
    score: f32,
    item: T,
}

impl<K: Ord, T> PartialEq for Ranked<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, T> Eq for Ranked<K, T> {}

impl<K: Ord, T> PartialOrd for Ranked<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> Ord for Ranked<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Bounded best-k selector. Ranking follows the metric's [`ScoreOrder`]; equal
/// scores are broken by ascending id so results are reproducible.
pub struct TopK<K, T = ()> {
    k: usize,
    order: ScoreOrder,
    heap: BinaryHeap<Reverse<Ranked<K, T>>>,
}

impl<K: Ord, T> TopK<K, T> {
    pub fn new(k: usize, order: ScoreOrder) -> Self {
        Self {
            k,
            order,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    /// NaN scores never rank.
    pub fn push(&mut self, id: K, score: f32, item: T) {
        if self.k == 0 || score.is_nan() {
            return;
        }
        let key = match self.order {
            ScoreOrder::HigherIsBetter => OrderedFloat(score),
            ScoreOrder::LowerIsBetter => OrderedFloat(-score),
        };
        self.heap.push(Reverse(Ranked { key, id, score, item }));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Best first.
    pub fn into_sorted(self) -> Vec<(K, f32, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| (r.id, r.score, r.item))
            .collect()
    }
}
