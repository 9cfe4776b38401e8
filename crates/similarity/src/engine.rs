//! Item-item Jaccard similarity engine — upper-triangle iteration over the
//! product→buyer incidence with merge-join pruning, a dense Gram-matrix
//! fast path, and a worker-parallel sparse path for large catalogs.

use crate::heap::TopNHeap;
use crate::incidence::Incidence;
use crate::sparse::SortedIdSet;
use crate::{dense, parallel};
use recs_core::config::EngineConfig;
use recs_core::types::ScoredItem;
use std::collections::HashMap;
use tracing::{debug, warn};

pub struct SimilarityEngine {
    config: EngineConfig,
}

impl SimilarityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute top-N Jaccard neighbours for every product of the incidence.
    /// Every product appears in the output, possibly with an empty list.
    /// All three paths produce identical results; dense and parallel
    /// failures fall back to the sequential path for the whole computation.
    pub fn compute(&self, incidence: &Incidence) -> HashMap<String, Vec<ScoredItem>> {
        if incidence.is_empty() {
            return HashMap::new();
        }

        let product_count = incidence.len();
        let start = std::time::Instant::now();

        let heaps = if product_count >= self.config.parallel_threshold {
            match parallel::compute(incidence, &self.config) {
                Ok(heaps) => heaps,
                Err(e) => {
                    warn!(error = %e, "Parallel path failed, falling back to sequential");
                    metrics::counter!("similarity.parallel_fallbacks").increment(1);
                    self.compute_sequential(incidence)
                }
            }
        } else if self.dense_eligible(incidence) {
            match dense::compute(incidence, &self.config) {
                Ok(heaps) => heaps,
                Err(e) => {
                    warn!(error = %e, "Dense path failed, falling back to sequential");
                    metrics::counter!("similarity.dense_fallbacks").increment(1);
                    self.compute_sequential(incidence)
                }
            }
        } else {
            self.compute_sequential(incidence)
        };

        let elapsed_ms = start.elapsed().as_millis() as f64;
        metrics::histogram!("similarity.compute_ms").record(elapsed_ms);
        debug!(
            products = product_count,
            buyers = incidence.buyer_count(),
            elapsed_ms = elapsed_ms,
            "Similarity computation complete"
        );

        heaps_to_map(incidence, heaps)
    }

    /// Dense path window: mid-sized catalog with a moderately filled
    /// incidence matrix. Density bounds are strict per the path heuristic.
    fn dense_eligible(&self, incidence: &Incidence) -> bool {
        let p = incidence.len();
        if p < self.config.dense_min_products || p > self.config.dense_max_products {
            return false;
        }
        let density = incidence.density();
        density > self.config.dense_min_density && density < self.config.dense_max_density
    }

    /// Sequential sparse path: visit every pair `(i, j)` with `i < j` once
    /// and push symmetric updates into both endpoint heaps.
    pub(crate) fn compute_sequential(&self, incidence: &Incidence) -> Vec<TopNHeap> {
        let product_count = incidence.len();
        let min_common = self.config.min_common_users;
        let mut heaps = vec![TopNHeap::new(self.config.top_n); product_count];

        for i in 0..product_count {
            if incidence.set(i).len() < min_common {
                continue;
            }
            for j in (i + 1)..product_count {
                if let Some(score) =
                    score_pair(incidence.set(i), incidence.set(j), min_common)
                {
                    heaps[i].push(score, j as u32);
                    heaps[j].push(score, i as u32);
                }
            }
        }

        heaps
    }
}

/// Jaccard score for one pair, or `None` when pruned. Pruning order: set
/// sizes below the threshold, then merge-join early exit.
pub(crate) fn score_pair(a: &SortedIdSet, b: &SortedIdSet, min_common: usize) -> Option<f64> {
    if a.len() < min_common || b.len() < min_common {
        return None;
    }
    let (intersection, early_exit) = a.intersect_with_threshold(b, min_common);
    if early_exit {
        return None;
    }
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return None;
    }
    Some(intersection as f64 / union as f64)
}

/// Drain per-index heaps into the per-product output map. Every product of
/// the incidence gets an entry, empty lists included.
pub(crate) fn heaps_to_map(
    incidence: &Incidence,
    heaps: Vec<TopNHeap>,
) -> HashMap<String, Vec<ScoredItem>> {
    let mut result = HashMap::with_capacity(incidence.len());
    for (index, heap) in heaps.into_iter().enumerate() {
        let items = heap
            .into_descending_vec()
            .into_iter()
            .map(|entry| ScoredItem::new(incidence.product_id(entry.product as usize), entry.score))
            .collect();
        result.insert(incidence.product_id(index).to_string(), items);
    }
    result
}
