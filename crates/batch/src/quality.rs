//! Quality gates computed over a batch's full record set before promotion.

use recs_core::types::{QualityMetrics, RecommendationRecord};
use std::collections::HashSet;

/// `avg_score` is the mean item score, `coverage` the share of the catalog
/// with a non-empty list, `diversity` the share of distinct consequents
/// among all items. All three land in [0, 1]; an empty record set scores
/// zero across the board.
pub fn compute_quality(records: &[RecommendationRecord], catalog_size: u64) -> QualityMetrics {
    let total_items: usize = records.iter().map(|r| r.items.len()).sum();
    if total_items == 0 {
        return QualityMetrics::zero();
    }

    let score_sum: f64 = records
        .iter()
        .flat_map(|r| r.items.iter())
        .map(|item| item.score)
        .sum();

    let covered = records.iter().filter(|r| !r.items.is_empty()).count();
    let coverage = if catalog_size == 0 {
        0.0
    } else {
        (covered as f64 / catalog_size as f64).min(1.0)
    };

    let distinct: HashSet<&str> = records
        .iter()
        .flat_map(|r| r.items.iter())
        .map(|item| item.product_id.as_str())
        .collect();

    QualityMetrics {
        avg_score: score_sum / total_items as f64,
        coverage,
        diversity: distinct.len() as f64 / total_items as f64,
    }
}
