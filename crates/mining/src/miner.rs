//! Association-rule mining over pairwise order co-occurrence counts.

use recs_core::config::MinerConfig;
use recs_core::types::{AssociationRule, CoOccurrence, ProductFrequencies, ScoredItem};
use std::collections::HashMap;
use tracing::debug;

pub struct RuleMiner {
    config: MinerConfig,
}

impl RuleMiner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Generate rules per antecedent. `frequencies` counts distinct orders
    /// per product and is authoritative — summing a co-occurrence row would
    /// double-count orders holding three or more products.
    ///
    /// `(a, b)` and `(b, a)` are independent rules with independent
    /// confidences; no deduplication happens here.
    pub fn mine(
        &self,
        cooccurrence: &CoOccurrence,
        frequencies: &ProductFrequencies,
        order_count: u64,
    ) -> HashMap<String, Vec<AssociationRule>> {
        if order_count == 0 || cooccurrence.is_empty() {
            return HashMap::new();
        }

        let total = order_count as f64;
        let mut rules_by_antecedent = HashMap::new();

        for (antecedent, consequents) in cooccurrence {
            let freq_a = frequencies.get(antecedent).copied().unwrap_or(0);
            if freq_a == 0 {
                continue;
            }

            let mut rules: Vec<AssociationRule> = consequents
                .iter()
                .filter(|(consequent, _)| consequent.as_str() != antecedent.as_str())
                .filter_map(|(consequent, &pair_count)| {
                    let freq_b = frequencies.get(consequent).copied().unwrap_or(0);
                    if freq_b == 0 {
                        return None;
                    }

                    let support = pair_count as f64 / total;
                    let confidence = pair_count as f64 / freq_a as f64;
                    let denominator = freq_a as f64 * freq_b as f64;
                    let lift = if denominator == 0.0 {
                        0.0
                    } else {
                        pair_count as f64 * total / denominator
                    };

                    if support >= self.config.min_support
                        && confidence >= self.config.min_confidence
                    {
                        Some(AssociationRule {
                            antecedent: antecedent.clone(),
                            consequent: consequent.clone(),
                            support,
                            confidence,
                            lift,
                        })
                    } else {
                        None
                    }
                })
                .collect();

            if rules.is_empty() {
                continue;
            }

            // Confidence desc, lift desc, consequent id asc.
            rules.sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then(b.lift.total_cmp(&a.lift))
                    .then(a.consequent.cmp(&b.consequent))
            });

            rules_by_antecedent.insert(antecedent.clone(), rules);
        }

        debug!(
            antecedents = rules_by_antecedent.len(),
            "Association mining complete"
        );

        rules_by_antecedent
    }
}

/// "Frequently bought with": the top-N consequents for one antecedent,
/// scored by confidence. Assumes `rules` is already in miner sort order.
pub fn frequently_bought_with(rules: &[AssociationRule], top_n: usize) -> Vec<ScoredItem> {
    rules
        .iter()
        .take(top_n)
        .map(|rule| ScoredItem::new(rule.consequent.clone(), rule.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, &str, u64)]) -> CoOccurrence {
        let mut c: CoOccurrence = HashMap::new();
        for (a, b, n) in pairs {
            c.entry(a.to_string())
                .or_default()
                .insert(b.to_string(), *n);
            c.entry(b.to_string())
                .or_default()
                .insert(a.to_string(), *n);
        }
        c
    }

    fn frequencies(freqs: &[(&str, u64)]) -> ProductFrequencies {
        freqs.iter().map(|(p, f)| (p.to_string(), *f)).collect()
    }

    fn miner(min_support: f64, min_confidence: f64) -> RuleMiner {
        RuleMiner::new(MinerConfig {
            min_support,
            min_confidence,
        })
    }

    #[test]
    fn test_rule_arithmetic() {
        // N=10, C[P1][P2]=8, f(P1)=10, f(P2)=8:
        // support 0.8, confidence 0.8, lift 1.0
        let c = counts(&[("P1", "P2", 8)]);
        let f = frequencies(&[("P1", 10), ("P2", 8)]);
        let rules = miner(0.01, 0.3).mine(&c, &f, 10);

        let rule = &rules["P1"][0];
        assert_eq!(rule.consequent, "P2");
        assert!((rule.support - 0.8).abs() < 1e-12);
        assert!((rule.confidence - 0.8).abs() < 1e-12);
        assert!((rule.lift - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lift_law() {
        let c = counts(&[("A", "B", 3), ("A", "C", 2), ("B", "C", 4)]);
        let f = frequencies(&[("A", 5), ("B", 6), ("C", 4)]);
        let n = 20u64;
        let rules = miner(0.0, 0.0).mine(&c, &f, n);

        for rule_list in rules.values() {
            for rule in rule_list {
                let freq_a = f[&rule.antecedent] as f64;
                let freq_b = f[&rule.consequent] as f64;
                let pair = rule.support * n as f64;
                assert!((rule.lift * freq_a * freq_b - pair * n as f64).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_directions_are_independent() {
        // Different frequencies give the two directions different confidences.
        let c = counts(&[("A", "B", 4)]);
        let f = frequencies(&[("A", 8), ("B", 4)]);
        let rules = miner(0.0, 0.0).mine(&c, &f, 10);

        assert!((rules["A"][0].confidence - 0.5).abs() < 1e-12);
        assert!((rules["B"][0].confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_frequency_skips() {
        let c = counts(&[("A", "B", 2), ("A", "C", 2)]);
        let f = frequencies(&[("A", 4), ("C", 3)]); // B missing → f(B)=0
        let rules = miner(0.0, 0.0).mine(&c, &f, 10);

        let a_consequents: Vec<&str> =
            rules["A"].iter().map(|r| r.consequent.as_str()).collect();
        assert_eq!(a_consequents, vec!["C"]);
        assert!(!rules.contains_key("B"));
    }

    #[test]
    fn test_thresholds_filter() {
        let c = counts(&[("A", "B", 1), ("A", "C", 9)]);
        let f = frequencies(&[("A", 10), ("B", 5), ("C", 9)]);
        // support(A,B) = 0.05 < 0.1 → dropped; (A,C) = 0.45 survives
        let rules = miner(0.1, 0.3).mine(&c, &f, 20);

        let a_consequents: Vec<&str> =
            rules["A"].iter().map(|r| r.consequent.as_str()).collect();
        assert_eq!(a_consequents, vec!["C"]);
    }

    #[test]
    fn test_sort_order() {
        // B and C tie on confidence; C has the higher lift and ranks first.
        let c = counts(&[("A", "B", 4), ("A", "C", 4), ("A", "D", 6)]);
        let f = frequencies(&[("A", 8), ("B", 8), ("C", 4), ("D", 8)]);
        let rules = miner(0.0, 0.0).mine(&c, &f, 16);

        let order: Vec<&str> = rules["A"].iter().map(|r| r.consequent.as_str()).collect();
        assert_eq!(order, vec!["D", "C", "B"]);
    }

    #[test]
    fn test_empty_inputs() {
        let empty = HashMap::new();
        let f = frequencies(&[("A", 1)]);
        assert!(miner(0.0, 0.0).mine(&empty, &f, 10).is_empty());

        let c = counts(&[("A", "B", 1)]);
        assert!(miner(0.0, 0.0).mine(&c, &f, 0).is_empty());
    }

    #[test]
    fn test_frequently_bought_with() {
        let c = counts(&[("A", "B", 6), ("A", "C", 3)]);
        let f = frequencies(&[("A", 6), ("B", 6), ("C", 6)]);
        let rules = miner(0.0, 0.0).mine(&c, &f, 12);

        let top = frequently_bought_with(&rules["A"], 1);
        assert_eq!(top, vec![ScoredItem::new("B", 1.0)]);
    }
}
