//! Redis-backed key-value store used for the version registry and the
//! recommendation hot-cache in clustered deployments.

use crate::kv::KvStore;
use async_trait::async_trait;
use recs_core::config::RedisConfig;
use recs_core::{RecsError, RecsResult};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    /// Connect to Redis and verify connectivity with a PING.
    pub async fn new(config: &RedisConfig) -> RecsResult<Self> {
        let url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url.as_str())
            .map_err(|e| RecsError::Cache(e.to_string()))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RecsError::Cache(e.to_string()))?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| RecsError::Cache(e.to_string()))?;
        info!(response = %pong, "Redis connection established");

        Ok(Self { client })
    }

    async fn connection(&self) -> RecsResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RecsError::Cache(e.to_string()))
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> RecsResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| RecsError::Cache(e.to_string()))?;
        if value.is_none() {
            metrics::counter!("kv.misses").increment(1);
            debug!(key = key, "Key-value miss");
        } else {
            metrics::counter!("kv.hits").increment(1);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> RecsResult<()> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(|e| RecsError::Cache(e.to_string()))?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| RecsError::Cache(e.to_string()))?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> RecsResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| RecsError::Cache(e.to_string()))?;
        Ok(())
    }
}
