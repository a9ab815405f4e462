//! Bounded top-K collection.
//!
//! Scoring feeds every candidate through a min-heap of size K, so only the
//! current top-K survive and the full result set is never sorted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored document inside the heap.
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub doc_id: u32,
    pub score: f64,
}

impl PartialEq for ScoredDoc {
    fn eq(&self, other: &Self) -> bool {
        self.doc_id == other.doc_id && self.score == other.score
    }
}

impl Eq for ScoredDoc {}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    // "Greater" means worse: lower score, ties broken by larger doc_id.
    // BinaryHeap then peeks the worst retained document, and ascending sort
    // yields the final ordering (score desc, doc_id asc).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Keeps the best K documents seen so far.
#[derive(Debug)]
pub struct TopKCollector {
    k: usize,
    heap: BinaryHeap<ScoredDoc>,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Offer one scored document.
    pub fn collect(&mut self, doc_id: u32, score: f64) {
        if self.k == 0 {
            return;
        }
        let candidate = ScoredDoc { doc_id, score };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Final ranking: score descending, ties by ascending doc_id.
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        let mut docs = self.heap.into_vec();
        docs.sort_unstable();
        docs
    }
}
