//! In-process key-value store backed by DashMap for lock-free concurrent
//! access. Stands in for Redis in tests and single-node deployments.

use crate::kv::KvStore;
use async_trait::async_trait;
use dashmap::DashMap;
use recs_core::RecsResult;
use std::time::{Duration, Instant};

struct KvEntry {
    value: String,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl KvEntry {
    fn expired(&self) -> bool {
        self.ttl
            .map(|ttl| self.inserted_at.elapsed() > ttl)
            .unwrap_or(false)
    }
}

/// Lock-free local store with per-entry TTLs. Expired entries are dropped
/// lazily on read; `evict_expired` sweeps the rest.
#[derive(Default)]
pub struct InMemoryKv {
    store: DashMap<String, KvEntry>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries. Call periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.expired());
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> RecsResult<Option<String>> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };
        if entry.expired() {
            drop(entry);
            self.store.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> RecsResult<()> {
        self.store.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> RecsResult<()> {
        self.store.remove(key);
        Ok(())
    }
}
