//! Typed read/write boundary to the catalog, order, and recommendation
//! stores. Implementations are deployment-specific; the pipeline only
//! sees these traits.

use async_trait::async_trait;
use recs_core::types::{CoOccurrence, Order, Product, ProductFrequencies, RecommendationRecord};
use recs_core::RecsResult;

/// Read access to the order history and product catalog.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_orders(&self) -> RecsResult<Vec<Order>>;

    /// Symmetric pairwise co-occurrence counts over all orders.
    async fn co_occurrence_pairs(&self) -> RecsResult<CoOccurrence>;

    /// Distinct-order count per product (not buyer count, not pair sums).
    async fn product_frequencies(&self) -> RecsResult<ProductFrequencies>;

    async fn order_count(&self) -> RecsResult<u64>;

    async fn catalog_size(&self) -> RecsResult<u64>;

    async fn list_catalog(&self, limit: usize) -> RecsResult<Vec<Product>>;
}

/// Read/write access to persisted recommendation documents. The base jobs
/// share one batch version and each writes its own algorithm's record per
/// product, so document identity is `(product_id, algorithm, version)`.
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// Look up the record served for a product under a version. When
    /// several algorithms stored records, the hybrid one wins, then
    /// collaborative, then association.
    async fn find(&self, product_id: &str, version: &str)
        -> RecsResult<Option<RecommendationRecord>>;

    async fn find_by_version(&self, version: &str) -> RecsResult<Vec<RecommendationRecord>>;

    /// Idempotent on `(product_id, algorithm, version)`. Returns the
    /// number of records written.
    async fn bulk_upsert(&self, records: Vec<RecommendationRecord>) -> RecsResult<usize>;

    async fn delete_by_version(&self, version: &str) -> RecsResult<usize>;

    async fn count_by_version(&self, version: &str) -> RecsResult<u64>;
}
