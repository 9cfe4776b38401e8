//! Batch orchestrator — drives one algorithm job from version allocation
//! through computation, persistence, quality validation, atomic promotion,
//! and hot-cache warm-up.

use crate::quality::compute_quality;
use chrono::Utc;
use recs_blending::{blend, resolve_weights, BlendContext};
use recs_cache::KvStore;
use recs_core::config::AppConfig;
use recs_core::types::{
    Algorithm, BatchState, QualityMetrics, RecommendationRecord, RecommendedItem, ScoreBreakdown,
    ScoredItem,
};
use recs_core::{RecsError, RecsResult};
use recs_mining::{frequently_bought_with, RuleMiner};
use recs_similarity::{Incidence, SimilarityEngine};
use recs_store::{OrderRepository, RecommendationRepository};
use recs_versioning::{hot_cache_key, VersionRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which batch job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Collaborative,
    Association,
    Hybrid,
}

impl JobKind {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            JobKind::Collaborative => Algorithm::Collaborative,
            JobKind::Association => Algorithm::Association,
            JobKind::Hybrid => Algorithm::Hybrid,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.algorithm().as_str())
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job: JobKind,
    pub version: String,
    pub batch_id: Uuid,
    pub records_written: usize,
    pub quality: QualityMetrics,
    pub state: BatchState,
}

pub struct BatchOrchestrator {
    config: AppConfig,
    orders: Arc<dyn OrderRepository>,
    recommendations: Arc<dyn RecommendationRepository>,
    registry: Arc<VersionRegistry>,
    kv: Arc<dyn KvStore>,
}

impl BatchOrchestrator {
    pub fn new(
        config: AppConfig,
        orders: Arc<dyn OrderRepository>,
        recommendations: Arc<dyn RecommendationRepository>,
        registry: Arc<VersionRegistry>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            config,
            orders,
            recommendations,
            registry,
            kv,
        }
    }

    pub async fn run(&self, job: JobKind) -> RecsResult<BatchReport> {
        let start = std::time::Instant::now();
        metrics::counter!("batch.runs", "job" => job.algorithm().as_str()).increment(1);

        let result = match job {
            JobKind::Collaborative => self.run_collaborative().await,
            JobKind::Association => self.run_association().await,
            JobKind::Hybrid => self.run_hybrid().await,
        };

        let elapsed_ms = start.elapsed().as_millis() as f64;
        metrics::histogram!("batch.duration_ms").record(elapsed_ms);
        match &result {
            Ok(report) => info!(
                job = %job,
                version = %report.version,
                records = report.records_written,
                state = %report.state,
                elapsed_ms = elapsed_ms,
                "Batch finished"
            ),
            Err(e) => {
                metrics::counter!("batch.failures").increment(1);
                warn!(job = %job, error = %e, "Batch failed");
            }
        }

        result
    }

    /// Swap the current and previous versions (runtime "rollback" signal).
    pub async fn rollback(&self) -> RecsResult<(String, String)> {
        self.registry.rollback().await
    }

    async fn run_collaborative(&self) -> RecsResult<BatchReport> {
        let batch_id = Uuid::new_v4();
        let version = self.acquire_version().await?;
        self.transition(JobKind::Collaborative, &version, BatchState::Allocated);

        let orders = self
            .with_retry("list_orders", || self.orders.list_orders())
            .await?;
        self.transition(JobKind::Collaborative, &version, BatchState::Computing);

        if orders.is_empty() {
            debug!("No orders available, producing empty collaborative output");
            return self
                .finish_degenerate(JobKind::Collaborative, version, batch_id)
                .await;
        }

        let incidence = Incidence::from_orders(&orders);
        let engine = SimilarityEngine::new(self.config.engine.clone());
        let similarities = engine.compute(&incidence);

        let created_at = Utc::now();
        let records: Vec<RecommendationRecord> = similarities
            .into_iter()
            .map(|(product_id, items)| RecommendationRecord {
                product_id,
                algorithm: Algorithm::Collaborative,
                items: items
                    .into_iter()
                    .map(|item| RecommendedItem {
                        product_id: item.product_id,
                        score: item.score,
                        breakdown: ScoreBreakdown::collaborative_only(item.score),
                    })
                    .collect(),
                version: version.clone(),
                batch_id,
                created_at,
            })
            .collect();

        self.finish(JobKind::Collaborative, version, batch_id, records, true)
            .await
    }

    async fn run_association(&self) -> RecsResult<BatchReport> {
        let batch_id = Uuid::new_v4();
        let version = self.acquire_version().await?;
        self.transition(JobKind::Association, &version, BatchState::Allocated);

        let cooccurrence = self
            .with_retry("co_occurrence_pairs", || self.orders.co_occurrence_pairs())
            .await?;
        let frequencies = self
            .with_retry("product_frequencies", || self.orders.product_frequencies())
            .await?;
        let order_count = self
            .with_retry("order_count", || self.orders.order_count())
            .await?;
        self.transition(JobKind::Association, &version, BatchState::Computing);

        let miner = RuleMiner::new(self.config.miner.clone());
        let rules = miner.mine(&cooccurrence, &frequencies, order_count);

        if rules.is_empty() {
            debug!("No rules survived the thresholds, producing empty association output");
            return self
                .finish_degenerate(JobKind::Association, version, batch_id)
                .await;
        }

        let created_at = Utc::now();
        let top_n = self.config.engine.top_n;
        let records: Vec<RecommendationRecord> = rules
            .into_iter()
            .map(|(product_id, product_rules)| RecommendationRecord {
                product_id,
                algorithm: Algorithm::Association,
                items: frequently_bought_with(&product_rules, top_n)
                    .into_iter()
                    .map(|item| RecommendedItem {
                        product_id: item.product_id,
                        score: item.score,
                        breakdown: ScoreBreakdown::association_only(item.score),
                    })
                    .collect(),
                version: version.clone(),
                batch_id,
                created_at,
            })
            .collect();

        self.finish(JobKind::Association, version, batch_id, records, true)
            .await
    }

    /// The hybrid job requires both base algorithms' records under the
    /// shared version; it persists blended records but never promotes —
    /// the active version is whichever one the base jobs promoted.
    async fn run_hybrid(&self) -> RecsResult<BatchReport> {
        let batch_id = Uuid::new_v4();
        let version = self.acquire_version().await?;
        self.transition(JobKind::Hybrid, &version, BatchState::Allocated);

        let existing = self
            .with_retry("find_by_version", || {
                self.recommendations.find_by_version(&version)
            })
            .await?;

        let mut collaborative: HashMap<String, Vec<ScoredItem>> = HashMap::new();
        let mut association: HashMap<String, Vec<ScoredItem>> = HashMap::new();
        for record in existing {
            let items: Vec<ScoredItem> = record
                .items
                .iter()
                .map(|item| ScoredItem::new(item.product_id.clone(), item.score))
                .collect();
            match record.algorithm {
                Algorithm::Collaborative => {
                    collaborative.insert(record.product_id, items);
                }
                Algorithm::Association => {
                    association.insert(record.product_id, items);
                }
                Algorithm::Hybrid => {}
            }
        }

        if collaborative.is_empty() {
            return Err(RecsError::HybridPrecondition(format!(
                "no collaborative records under version {version}"
            )));
        }
        if association.is_empty() {
            return Err(RecsError::HybridPrecondition(format!(
                "no association records under version {version}"
            )));
        }
        self.transition(JobKind::Hybrid, &version, BatchState::Computing);

        // Batch mode blends without a user history signal.
        let weights = resolve_weights(BlendContext {
            has_collaborative: true,
            has_association: true,
            has_user_history: false,
        });

        let sources: BTreeSet<&String> = collaborative.keys().chain(association.keys()).collect();
        let created_at = Utc::now();
        let top_n = self.config.engine.top_n;
        let empty: Vec<ScoredItem> = Vec::new();

        let records: Vec<RecommendationRecord> = sources
            .into_iter()
            .map(|product_id| {
                let collab = collaborative.get(product_id).unwrap_or(&empty);
                let assoc = association.get(product_id).unwrap_or(&empty);
                RecommendationRecord {
                    product_id: product_id.clone(),
                    algorithm: Algorithm::Hybrid,
                    items: blend(collab, assoc, weights, top_n),
                    version: version.clone(),
                    batch_id,
                    created_at,
                }
            })
            .collect();

        self.finish(JobKind::Hybrid, version, batch_id, records, false)
            .await
    }

    /// Common tail of every job: invariant check, persistence, quality
    /// validation, then (for promoting jobs) pointer rotation and warm-up.
    async fn finish(
        &self,
        job: JobKind,
        version: String,
        batch_id: Uuid,
        records: Vec<RecommendationRecord>,
        promotes: bool,
    ) -> RecsResult<BatchReport> {
        check_invariants(&records, self.config.engine.top_n)?;

        let written = self
            .with_retry("bulk_upsert", || {
                self.recommendations.bulk_upsert(records.clone())
            })
            .await?;
        self.transition(job, &version, BatchState::Persisted);

        let catalog_size = self
            .with_retry("catalog_size", || self.orders.catalog_size())
            .await?;
        let quality = compute_quality(&records, catalog_size);
        self.transition(job, &version, BatchState::Validated);

        let mut state = BatchState::Validated;
        if promotes {
            self.with_retry("promote", || self.registry.promote(&version, quality))
                .await?;
            self.transition(job, &version, BatchState::Promoted);

            self.warm_cache(&records, &version).await;
            self.transition(job, &version, BatchState::Warmed);
            state = BatchState::Warmed;
        }

        Ok(BatchReport {
            job,
            version,
            batch_id,
            records_written: written,
            quality,
            state,
        })
    }

    /// Degenerate inputs are not failures: produce an empty report and
    /// only promote when explicitly configured to publish empty versions.
    async fn finish_degenerate(
        &self,
        job: JobKind,
        version: String,
        batch_id: Uuid,
    ) -> RecsResult<BatchReport> {
        let quality = QualityMetrics::zero();
        let mut state = BatchState::Validated;

        if self.config.batch.promote_empty {
            self.with_retry("promote", || self.registry.promote(&version, quality))
                .await?;
            self.transition(job, &version, BatchState::Promoted);
            state = BatchState::Promoted;
        }

        Ok(BatchReport {
            job,
            version,
            batch_id,
            records_written: 0,
            quality,
            state,
        })
    }

    async fn acquire_version(&self) -> RecsResult<String> {
        let ttl = Duration::from_secs(self.config.batch.batch_version_ttl_secs);
        self.with_retry("batch_version", || self.registry.batch_version(ttl))
            .await
    }

    /// Pre-materialise hot-cache entries for up to `warm_cache_limit`
    /// catalog products. Warm-up is best-effort: failures are logged and
    /// swallowed, never failing a promoted batch.
    async fn warm_cache(&self, records: &[RecommendationRecord], version: &str) {
        let catalog = match self
            .orders
            .list_catalog(self.config.batch.warm_cache_limit)
            .await
        {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Skipping hot-cache warm-up, catalog unavailable");
                return;
            }
        };

        let by_product: HashMap<&str, &RecommendationRecord> = records
            .iter()
            .map(|record| (record.product_id.as_str(), record))
            .collect();

        let ttl = Duration::from_secs(self.config.cache.hot_ttl_secs);
        let mut warmed = 0usize;

        for product in &catalog {
            let Some(record) = by_product.get(product.id.as_str()) else {
                continue;
            };
            let json = match serde_json::to_string(record) {
                Ok(json) => json,
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Skipping hot-cache entry");
                    continue;
                }
            };
            let key = hot_cache_key(&product.id, version);
            match self.kv.put(&key, &json, Some(ttl)).await {
                Ok(()) => warmed += 1,
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Hot-cache warm-up failed")
                }
            }
        }

        metrics::counter!("batch.cache_warmed").increment(warmed as u64);
        debug!(warmed, version = %version, "Hot-cache warm-up complete");
    }

    fn transition(&self, job: JobKind, version: &str, state: BatchState) {
        debug!(job = %job, version = %version, state = %state, "Batch state transition");
    }

    /// Retry a repository/registry operation with exponential backoff.
    /// Exhaustion fails the batch without promotion.
    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> RecsResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RecsResult<T>>,
    {
        let attempts = self.config.batch.retry_attempts.max(1);
        let base_delay = Duration::from_millis(self.config.batch.retry_base_delay_ms);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = base_delay * 2u32.saturating_pow(attempt as u32 - 1);
                warn!(operation, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                tokio::time::sleep(delay).await;
            }
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(operation, attempt, error = %e, "Operation failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| RecsError::Repository(format!("{operation} failed"))))
    }
}

/// Programmer-error gate run before anything durable happens: list bounds,
/// no self-recommendation, scores within [0, 1] and non-increasing.
fn check_invariants(records: &[RecommendationRecord], top_n: usize) -> RecsResult<()> {
    for record in records {
        if record.items.len() > top_n {
            return Err(RecsError::Invariant(format!(
                "{} has {} items, top-N is {}",
                record.product_id,
                record.items.len(),
                top_n
            )));
        }
        let mut last_score = f64::INFINITY;
        for item in &record.items {
            if item.product_id == record.product_id {
                return Err(RecsError::Invariant(format!(
                    "{} recommends itself",
                    record.product_id
                )));
            }
            if !(0.0..=1.0).contains(&item.score) {
                return Err(RecsError::Invariant(format!(
                    "score {} out of range for {} -> {}",
                    item.score, record.product_id, item.product_id
                )));
            }
            if item.score > last_score {
                return Err(RecsError::Invariant(format!(
                    "scores not non-increasing for {}",
                    record.product_id
                )));
            }
            last_score = item.score;
        }
    }
    Ok(())
}
