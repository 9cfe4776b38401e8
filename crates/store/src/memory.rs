//! In-memory repository implementations, used by the CLI driver and the
//! integration tests. Co-occurrence, frequencies, and counts are derived
//! from the held orders on demand.

use crate::repository::{OrderRepository, RecommendationRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use recs_core::types::{
    Algorithm, CoOccurrence, Order, Product, ProductFrequencies, RecommendationRecord,
};
use recs_core::RecsResult;
use std::collections::BTreeSet;

/// Order and catalog store backed by process memory.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    catalog: DashMap<String, Product>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(&self, order: Order) {
        self.orders.write().push(order);
    }

    pub fn insert_orders(&self, orders: impl IntoIterator<Item = Order>) {
        self.orders.write().extend(orders);
    }

    pub fn insert_product(&self, product: Product) {
        self.catalog.insert(product.id.clone(), product);
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn list_orders(&self) -> RecsResult<Vec<Order>> {
        Ok(self.orders.read().clone())
    }

    async fn co_occurrence_pairs(&self) -> RecsResult<CoOccurrence> {
        let orders = self.orders.read();
        let mut counts = CoOccurrence::new();
        for order in orders.iter() {
            // Distinct product set per order; self-pairs excluded.
            let products: BTreeSet<&str> =
                order.product_ids.iter().map(|p| p.as_str()).collect();
            let products: Vec<&str> = products.into_iter().collect();
            for (i, a) in products.iter().enumerate() {
                for b in &products[i + 1..] {
                    *counts
                        .entry(a.to_string())
                        .or_default()
                        .entry(b.to_string())
                        .or_insert(0) += 1;
                    *counts
                        .entry(b.to_string())
                        .or_default()
                        .entry(a.to_string())
                        .or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn product_frequencies(&self) -> RecsResult<ProductFrequencies> {
        let orders = self.orders.read();
        let mut frequencies = ProductFrequencies::new();
        for order in orders.iter() {
            let products: BTreeSet<&str> =
                order.product_ids.iter().map(|p| p.as_str()).collect();
            for product in products {
                *frequencies.entry(product.to_string()).or_insert(0) += 1;
            }
        }
        Ok(frequencies)
    }

    async fn order_count(&self) -> RecsResult<u64> {
        Ok(self.orders.read().len() as u64)
    }

    async fn catalog_size(&self) -> RecsResult<u64> {
        Ok(self.catalog.len() as u64)
    }

    async fn list_catalog(&self, limit: usize) -> RecsResult<Vec<Product>> {
        Ok(self
            .catalog
            .iter()
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// Recommendation store. The base jobs share one batch version and both
/// write records for the same products, so identity is
/// `(product_id, algorithm, version)` — keying on the product and version
/// alone would let one algorithm's upsert clobber the other's.
#[derive(Default)]
pub struct InMemoryRecommendationStore {
    records: DashMap<(String, Algorithm, String), RecommendationRecord>,
}

impl InMemoryRecommendationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecommendationRepository for InMemoryRecommendationStore {
    async fn find(
        &self,
        product_id: &str,
        version: &str,
    ) -> RecsResult<Option<RecommendationRecord>> {
        // The read surface takes `(pid, version)`; the hybrid record is the
        // richest answer when the hybrid job has run.
        for algorithm in [
            Algorithm::Hybrid,
            Algorithm::Collaborative,
            Algorithm::Association,
        ] {
            let key = (product_id.to_string(), algorithm, version.to_string());
            if let Some(record) = self.records.get(&key) {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn find_by_version(&self, version: &str) -> RecsResult<Vec<RecommendationRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().2 == version)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn bulk_upsert(&self, records: Vec<RecommendationRecord>) -> RecsResult<usize> {
        let written = records.len();
        for record in records {
            let key = (
                record.product_id.clone(),
                record.algorithm,
                record.version.clone(),
            );
            self.records.insert(key, record);
        }
        Ok(written)
    }

    async fn delete_by_version(&self, version: &str) -> RecsResult<usize> {
        let before = self.records.len();
        self.records.retain(|key, _| key.2 != version);
        Ok(before - self.records.len())
    }

    async fn count_by_version(&self, version: &str) -> RecsResult<u64> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().2 == version)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn order(id: &str, buyer: &str, products: &[&str]) -> Order {
        Order {
            id: id.to_string(),
            buyer_id: buyer.to_string(),
            product_ids: products.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn record(pid: &str, version: &str) -> RecommendationRecord {
        RecommendationRecord {
            product_id: pid.to_string(),
            algorithm: Algorithm::Collaborative,
            items: Vec::new(),
            version: version.to_string(),
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cooccurrence_counts_orders_once() {
        let store = InMemoryOrderStore::new();
        // The duplicate P1 inside o2 must not inflate the pair count.
        store.insert_orders([
            order("o1", "u1", &["P1", "P2"]),
            order("o2", "u2", &["P1", "P1", "P2", "P3"]),
        ]);

        let counts = store.co_occurrence_pairs().await.unwrap();
        assert_eq!(counts["P1"]["P2"], 2);
        assert_eq!(counts["P2"]["P1"], 2);
        assert_eq!(counts["P1"]["P3"], 1);
        assert!(counts["P1"].get("P1").is_none());
    }

    #[tokio::test]
    async fn test_frequencies_count_distinct_orders() {
        let store = InMemoryOrderStore::new();
        // Three products in one order: the pairwise sum would double-count,
        // the frequency map must not.
        store.insert_orders([
            order("o1", "u1", &["P1", "P2", "P3"]),
            order("o2", "u1", &["P1"]),
        ]);

        let frequencies = store.product_frequencies().await.unwrap();
        assert_eq!(frequencies["P1"], 2);
        assert_eq!(frequencies["P2"], 1);
        assert_eq!(store.order_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_key() {
        let store = InMemoryRecommendationStore::new();
        store
            .bulk_upsert(vec![record("P1", "v1"), record("P1", "v1")])
            .await
            .unwrap();
        assert_eq!(store.count_by_version("v1").await.unwrap(), 1);

        store.bulk_upsert(vec![record("P1", "v2")]).await.unwrap();
        assert_eq!(store.count_by_version("v1").await.unwrap(), 1);
        assert!(store.find("P1", "v2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_algorithms_coexist_under_one_version() {
        let store = InMemoryRecommendationStore::new();
        let mut hybrid = record("P1", "v1");
        hybrid.algorithm = Algorithm::Hybrid;
        let mut association = record("P1", "v1");
        association.algorithm = Algorithm::Association;

        store
            .bulk_upsert(vec![record("P1", "v1"), association, hybrid])
            .await
            .unwrap();
        assert_eq!(store.count_by_version("v1").await.unwrap(), 3);

        // The read surface prefers the hybrid record.
        let found = store.find("P1", "v1").await.unwrap().unwrap();
        assert_eq!(found.algorithm, Algorithm::Hybrid);
    }

    #[tokio::test]
    async fn test_delete_by_version() {
        let store = InMemoryRecommendationStore::new();
        store
            .bulk_upsert(vec![record("P1", "v1"), record("P2", "v1"), record("P1", "v2")])
            .await
            .unwrap();

        let deleted = store.delete_by_version("v1").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_by_version("v1").await.unwrap(), 0);
        assert_eq!(store.count_by_version("v2").await.unwrap(), 1);
    }
}
