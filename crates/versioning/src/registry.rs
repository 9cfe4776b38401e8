//! Version registry — rolling current/previous/archived pointers, shared
//! batch-version acquisition, and per-version metadata records, all kept
//! behind the key-value store interface.

use chrono::Utc;
use recs_cache::KvStore;
use recs_core::types::{QualityMetrics, VersionMetadata, VersionStatus};
use recs_core::{RecsError, RecsResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const CURRENT_VERSION_KEY: &str = "rec:current_version";
pub const PREVIOUS_VERSION_KEY: &str = "rec:previous_version";
pub const ARCHIVED_VERSION_KEY: &str = "rec:archived_version";
pub const BATCH_VERSION_KEY: &str = "rec:batch_version";

pub fn version_metadata_key(version: &str) -> String {
    format!("rec:version:{version}")
}

pub fn hot_cache_key(product_id: &str, version: &str) -> String {
    format!("recs:{product_id}:{version}")
}

pub struct VersionRegistry {
    kv: Arc<dyn KvStore>,
    sequence: AtomicU64,
}

impl VersionRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            sequence: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh version tag. Tags order lexicographically by
    /// creation time; the per-process sequence breaks same-millisecond
    /// ties.
    pub fn allocate_version(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("v{millis:013}{sequence:06}")
    }

    /// Return the shared batch version, allocating and publishing a new
    /// one with `ttl` when none is live. A failed publish is logged and
    /// the allocated tag is used anyway — tags are unique per process, so
    /// correctness is unaffected.
    pub async fn batch_version(&self, ttl: Duration) -> RecsResult<String> {
        if let Some(version) = self.kv.get(BATCH_VERSION_KEY).await? {
            return Ok(version);
        }

        let version = self.allocate_version();
        if let Err(e) = self.kv.put(BATCH_VERSION_KEY, &version, Some(ttl)).await {
            warn!(version = %version, error = %e, "Failed to publish batch version, proceeding locally");
        }
        Ok(version)
    }

    pub async fn current_version(&self) -> RecsResult<Option<String>> {
        self.kv.get(CURRENT_VERSION_KEY).await
    }

    pub async fn previous_version(&self) -> RecsResult<Option<String>> {
        self.kv.get(PREVIOUS_VERSION_KEY).await
    }

    pub async fn archived_version(&self) -> RecsResult<Option<String>> {
        self.kv.get(ARCHIVED_VERSION_KEY).await
    }

    pub async fn metadata(&self, version: &str) -> RecsResult<Option<VersionMetadata>> {
        let Some(json) = self.kv.get(&version_metadata_key(version)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Rotate the pointers: `archived ← previous`, `previous ← current`,
    /// `current ← version`, then write the new version's metadata. This is
    /// the linearisation point of a batch — callers must have finished
    /// persisting records before promoting.
    pub async fn promote(&self, version: &str, quality: QualityMetrics) -> RecsResult<()> {
        let current = self.kv.get(CURRENT_VERSION_KEY).await?;
        let previous = self.kv.get(PREVIOUS_VERSION_KEY).await?;

        // Jobs sharing a batch version promote the same tag; re-promoting
        // the active version must not rotate it into `previous`.
        if current.as_deref() == Some(version) {
            return self.write_metadata(version, quality).await;
        }

        if let Some(previous) = &previous {
            self.kv.put(ARCHIVED_VERSION_KEY, previous, None).await?;
            self.set_status(previous, VersionStatus::Archived).await?;
        }
        if let Some(current) = &current {
            self.kv.put(PREVIOUS_VERSION_KEY, current, None).await?;
            self.set_status(current, VersionStatus::Previous).await?;
        }
        self.kv.put(CURRENT_VERSION_KEY, version, None).await?;
        self.write_metadata(version, quality).await?;

        info!(
            version = %version,
            previous = current.as_deref().unwrap_or("-"),
            archived = previous.as_deref().unwrap_or("-"),
            "Version promoted"
        );
        metrics::counter!("versions.promoted").increment(1);
        Ok(())
    }

    /// Swap `current` and `previous`. Applying it twice restores the
    /// original pointers.
    pub async fn rollback(&self) -> RecsResult<(String, String)> {
        let current = self
            .kv
            .get(CURRENT_VERSION_KEY)
            .await?
            .ok_or_else(|| RecsError::Registry("no current version to roll back".to_string()))?;
        let previous = self
            .kv
            .get(PREVIOUS_VERSION_KEY)
            .await?
            .ok_or_else(|| RecsError::Registry("no previous version to roll back to".to_string()))?;

        self.kv.put(CURRENT_VERSION_KEY, &previous, None).await?;
        self.kv.put(PREVIOUS_VERSION_KEY, &current, None).await?;
        self.set_status(&previous, VersionStatus::Active).await?;
        self.set_status(&current, VersionStatus::Previous).await?;

        info!(current = %previous, previous = %current, "Rolled back");
        metrics::counter!("versions.rollbacks").increment(1);
        Ok((previous, current))
    }

    async fn write_metadata(&self, version: &str, quality: QualityMetrics) -> RecsResult<()> {
        let metadata = VersionMetadata {
            version: version.to_string(),
            created_at: Utc::now(),
            status: VersionStatus::Active,
            quality,
        };
        self.kv
            .put(
                &version_metadata_key(version),
                &serde_json::to_string(&metadata)?,
                None,
            )
            .await
    }

    /// Rewrite a version's metadata status, ignoring versions that never
    /// recorded metadata.
    async fn set_status(&self, version: &str, status: VersionStatus) -> RecsResult<()> {
        let key = version_metadata_key(version);
        let Some(json) = self.kv.get(&key).await? else {
            return Ok(());
        };
        let mut metadata: VersionMetadata = serde_json::from_str(&json)?;
        metadata.status = status;
        self.kv
            .put(&key, &serde_json::to_string(&metadata)?, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recs_cache::InMemoryKv;

    fn registry() -> VersionRegistry {
        VersionRegistry::new(Arc::new(InMemoryKv::new()))
    }

    #[test]
    fn test_allocated_tags_are_monotonic() {
        let registry = registry();
        let a = registry.allocate_version();
        let b = registry.allocate_version();
        assert!(b > a);
        assert_eq!(a.len(), b.len());
    }

    #[tokio::test]
    async fn test_batch_version_reuse() {
        let registry = registry();
        let first = registry.batch_version(Duration::from_secs(60)).await.unwrap();
        let second = registry.batch_version(Duration::from_secs(60)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_promotion_rotation() {
        let registry = registry();
        registry.promote("v1", QualityMetrics::zero()).await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v1"));
        assert_eq!(registry.previous_version().await.unwrap(), None);

        registry.promote("v2", QualityMetrics::zero()).await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(registry.previous_version().await.unwrap().as_deref(), Some("v1"));

        registry.promote("v3", QualityMetrics::zero()).await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v3"));
        assert_eq!(registry.previous_version().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(registry.archived_version().await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_rollback_swaps_and_is_idempotent_in_pairs() {
        let registry = registry();
        registry.promote("v2", QualityMetrics::zero()).await.unwrap();
        registry.promote("v3", QualityMetrics::zero()).await.unwrap();

        registry.rollback().await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(registry.previous_version().await.unwrap().as_deref(), Some("v3"));

        registry.rollback().await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v3"));
        assert_eq!(registry.previous_version().await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_repromoting_active_version_does_not_rotate() {
        let registry = registry();
        registry.promote("v1", QualityMetrics::zero()).await.unwrap();
        registry.promote("v2", QualityMetrics::zero()).await.unwrap();

        // A second job sharing the batch version promotes the same tag.
        registry.promote("v2", QualityMetrics::zero()).await.unwrap();
        assert_eq!(registry.current_version().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(registry.previous_version().await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_rollback_without_history_fails() {
        let registry = registry();
        assert!(registry.rollback().await.is_err());

        registry.promote("v1", QualityMetrics::zero()).await.unwrap();
        assert!(registry.rollback().await.is_err());
    }

    #[tokio::test]
    async fn test_metadata_statuses_track_rotation() {
        let registry = registry();
        let quality = QualityMetrics {
            avg_score: 0.5,
            coverage: 0.8,
            diversity: 0.3,
        };
        registry.promote("v1", quality).await.unwrap();
        registry.promote("v2", QualityMetrics::zero()).await.unwrap();

        let v1 = registry.metadata("v1").await.unwrap().unwrap();
        assert_eq!(v1.status, VersionStatus::Previous);
        assert_eq!(v1.quality.coverage, 0.8);

        let v2 = registry.metadata("v2").await.unwrap().unwrap();
        assert_eq!(v2.status, VersionStatus::Active);
    }
}
