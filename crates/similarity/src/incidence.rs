//! Product→buyer incidence derived from the order stream.

use crate::sparse::SortedIdSet;
use recs_core::types::Order;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// For each product, the set of buyers that ever purchased it, with buyer
/// ids interned to dense `u32` indices. Products are indexed in ascending
/// id order, so index comparisons reproduce id comparisons.
#[derive(Debug, Clone)]
pub struct Incidence {
    products: Vec<String>,
    sets: Vec<SortedIdSet>,
    buyer_count: usize,
}

impl Incidence {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut buyer_index: HashMap<&str, u32> = HashMap::new();
        let mut by_product: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();

        for order in orders {
            let next = buyer_index.len() as u32;
            let buyer = *buyer_index.entry(order.buyer_id.as_str()).or_insert(next);
            for pid in &order.product_ids {
                by_product.entry(pid.as_str()).or_default().insert(buyer);
            }
        }

        let buyer_count = buyer_index.len();
        let mut products = Vec::with_capacity(by_product.len());
        let mut sets = Vec::with_capacity(by_product.len());
        for (pid, buyers) in by_product {
            products.push(pid.to_string());
            sets.push(SortedIdSet::from_sorted(buyers.into_iter().collect()));
        }

        Self {
            products,
            sets,
            buyer_count,
        }
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Number of distinct buyers across all orders.
    pub fn buyer_count(&self) -> usize {
        self.buyer_count
    }

    pub fn product_id(&self, index: usize) -> &str {
        &self.products[index]
    }

    pub fn product_ids(&self) -> &[String] {
        &self.products
    }

    pub fn set(&self, index: usize) -> &SortedIdSet {
        &self.sets[index]
    }

    pub fn sets(&self) -> &[SortedIdSet] {
        &self.sets
    }

    /// Fill ratio of the product×buyer matrix: `Σ|U(p)| / (P · M)`.
    pub fn density(&self) -> f64 {
        let cells = self.len() * self.buyer_count;
        if cells == 0 {
            return 0.0;
        }
        let filled: usize = self.sets.iter().map(|s| s.len()).sum();
        filled as f64 / cells as f64
    }
}
