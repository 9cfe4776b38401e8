//! Context-aware blending of collaborative and association scores into a
//! single ranked list with per-channel breakdowns.

use recs_core::types::{BlendWeights, RecommendedItem, ScoreBreakdown, ScoredItem};
use std::collections::BTreeMap;
use std::collections::HashSet;

/// What is known about the blend inputs when weights are resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendContext {
    pub has_collaborative: bool,
    pub has_association: bool,
    pub has_user_history: bool,
}

/// Resolve channel weights from the context. Weights always sum to 1.0;
/// a zeroed channel leaves the full weight on the other side.
pub fn resolve_weights(context: BlendContext) -> BlendWeights {
    let weights = match (context.has_collaborative, context.has_association) {
        (true, true) => {
            if context.has_user_history {
                BlendWeights::new(0.6, 0.4)
            } else {
                BlendWeights::new(0.3, 0.7)
            }
        }
        (true, false) => BlendWeights::new(1.0, 0.0),
        (false, true) => BlendWeights::new(0.0, 1.0),
        // Degenerate: nothing to blend, but the weights stay well-formed.
        (false, false) => BlendWeights::new(0.5, 0.5),
    };
    renormalize(weights)
}

fn renormalize(weights: BlendWeights) -> BlendWeights {
    let sum = weights.sum();
    if sum == 0.0 {
        return BlendWeights::new(0.5, 0.5);
    }
    // The table values already sum to 1 within rounding; dividing by the
    // near-1 sum would perturb them for nothing.
    if (sum - 1.0).abs() < f64::EPSILON {
        return weights;
    }
    BlendWeights::new(weights.collaborative / sum, weights.association / sum)
}

/// Blend one product's channel lists over the union of their consequents.
/// A consequent missing from a channel contributes zero to the blended
/// score and stays absent from that side of the breakdown. Sorted by
/// blended score descending, ties by consequent id descending.
pub fn blend(
    collaborative: &[ScoredItem],
    association: &[ScoredItem],
    weights: BlendWeights,
    top_n: usize,
) -> Vec<RecommendedItem> {
    let mut channels: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for item in collaborative {
        channels.entry(item.product_id.as_str()).or_default().0 = Some(item.score);
    }
    for item in association {
        channels.entry(item.product_id.as_str()).or_default().1 = Some(item.score);
    }

    let mut blended: Vec<RecommendedItem> = channels
        .into_iter()
        .map(|(product_id, (collab, assoc))| {
            let blended_score = weights.collaborative * collab.unwrap_or(0.0)
                + weights.association * assoc.unwrap_or(0.0);
            RecommendedItem {
                product_id: product_id.to_string(),
                score: blended_score,
                breakdown: ScoreBreakdown {
                    collaborative: collab,
                    association: assoc,
                    blended_score,
                    weights,
                },
            }
        })
        .collect();

    blended.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.product_id.cmp(&a.product_id))
    });
    blended.truncate(top_n);
    blended
}

/// Multiply the blended score of entries whose consequent is in `new_ids`
/// by `factor` (>= 1.0). Ordering is left to the caller.
pub fn boost_new_products(items: &mut [RecommendedItem], new_ids: &HashSet<String>, factor: f64) {
    if factor < 1.0 || new_ids.is_empty() {
        return;
    }
    for item in items {
        if new_ids.contains(&item.product_id) {
            item.score *= factor;
            item.breakdown.blended_score *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_table() {
        let both_history = resolve_weights(BlendContext {
            has_collaborative: true,
            has_association: true,
            has_user_history: true,
        });
        assert_eq!(both_history, BlendWeights::new(0.6, 0.4));

        let both_cold = resolve_weights(BlendContext {
            has_collaborative: true,
            has_association: true,
            has_user_history: false,
        });
        assert_eq!(both_cold, BlendWeights::new(0.3, 0.7));

        let collab_only = resolve_weights(BlendContext {
            has_collaborative: true,
            ..Default::default()
        });
        assert_eq!(collab_only, BlendWeights::new(1.0, 0.0));

        let assoc_only = resolve_weights(BlendContext {
            has_association: true,
            ..Default::default()
        });
        assert_eq!(assoc_only, BlendWeights::new(0.0, 1.0));

        let neither = resolve_weights(BlendContext::default());
        assert_eq!(neither, BlendWeights::new(0.5, 0.5));
    }

    #[test]
    fn test_weights_always_sum_to_one() {
        for collab in [false, true] {
            for assoc in [false, true] {
                for history in [false, true] {
                    let weights = resolve_weights(BlendContext {
                        has_collaborative: collab,
                        has_association: assoc,
                        has_user_history: history,
                    });
                    assert!((weights.sum() - 1.0).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_blend_union_and_scores() {
        // Collaborative: P1 0.8, P2 0.9. Association: P1 0.7, P3 0.8.
        // Weights (0.6, 0.4): P1 0.76, P2 0.54, P3 0.32.
        let collab = vec![ScoredItem::new("P1", 0.8), ScoredItem::new("P2", 0.9)];
        let assoc = vec![ScoredItem::new("P1", 0.7), ScoredItem::new("P3", 0.8)];
        let items = blend(&collab, &assoc, BlendWeights::new(0.6, 0.4), 10);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].product_id, "P1");
        assert!((items[0].score - 0.76).abs() < 1e-12);
        assert_eq!(items[1].product_id, "P2");
        assert!((items[1].score - 0.54).abs() < 1e-12);
        assert_eq!(items[2].product_id, "P3");
        assert!((items[2].score - 0.32).abs() < 1e-12);

        for item in &items {
            assert_eq!(item.breakdown.weights, BlendWeights::new(0.6, 0.4));
            assert_eq!(item.breakdown.blended_score, item.score);
        }
    }

    #[test]
    fn test_breakdown_omits_missing_channel() {
        let collab = vec![ScoredItem::new("P2", 0.9)];
        let assoc = vec![ScoredItem::new("P3", 0.8)];
        let items = blend(&collab, &assoc, BlendWeights::new(0.6, 0.4), 10);

        let p2 = items.iter().find(|i| i.product_id == "P2").unwrap();
        assert_eq!(p2.breakdown.collaborative, Some(0.9));
        assert_eq!(p2.breakdown.association, None);

        let p3 = items.iter().find(|i| i.product_id == "P3").unwrap();
        assert_eq!(p3.breakdown.collaborative, None);
        assert_eq!(p3.breakdown.association, Some(0.8));
    }

    #[test]
    fn test_tie_break_descending_consequent() {
        let collab = vec![ScoredItem::new("A", 0.5), ScoredItem::new("B", 0.5)];
        let items = blend(&collab, &[], BlendWeights::new(1.0, 0.0), 10);
        assert_eq!(items[0].product_id, "B");
        assert_eq!(items[1].product_id, "A");
    }

    #[test]
    fn test_top_n_truncation() {
        let collab: Vec<ScoredItem> = (0..10)
            .map(|i| ScoredItem::new(format!("P{i}"), i as f64 / 10.0))
            .collect();
        let items = blend(&collab, &[], BlendWeights::new(1.0, 0.0), 3);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].product_id, "P9");
    }

    #[test]
    fn test_empty_channels() {
        let items = blend(&[], &[], BlendWeights::new(0.5, 0.5), 10);
        assert!(items.is_empty());
    }

    #[test]
    fn test_new_product_boost() {
        let collab = vec![ScoredItem::new("P1", 0.5), ScoredItem::new("P2", 0.4)];
        let mut items = blend(&collab, &[], BlendWeights::new(1.0, 0.0), 10);

        let new_ids: HashSet<String> = ["P2".to_string()].into_iter().collect();
        boost_new_products(&mut items, &new_ids, 1.5);

        let p2 = items.iter().find(|i| i.product_id == "P2").unwrap();
        assert!((p2.score - 0.6).abs() < 1e-12);
        assert!((p2.breakdown.blended_score - 0.6).abs() < 1e-12);

        // Untouched entry and no re-sorting.
        let p1 = items.iter().find(|i| i.product_id == "P1").unwrap();
        assert!((p1.score - 0.5).abs() < 1e-12);
        assert_eq!(items[0].product_id, "P1");
    }

    #[test]
    fn test_boost_below_one_is_ignored() {
        let collab = vec![ScoredItem::new("P1", 0.5)];
        let mut items = blend(&collab, &[], BlendWeights::new(1.0, 0.0), 10);
        let new_ids: HashSet<String> = ["P1".to_string()].into_iter().collect();
        boost_new_products(&mut items, &new_ids, 0.5);
        assert!((items[0].score - 0.5).abs() < 1e-12);
    }
}
