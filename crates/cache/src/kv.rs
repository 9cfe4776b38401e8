//! Key-value store interface shared by the version registry and the
//! recommendation hot-cache.

use async_trait::async_trait;
use recs_core::RecsResult;
use std::time::Duration;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> RecsResult<Option<String>>;

    /// Store a value, optionally expiring after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> RecsResult<()>;

    async fn delete(&self, key: &str) -> RecsResult<()>;
}
