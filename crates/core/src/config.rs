use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `RECS__` (double-underscore section separator).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Similarity engine parameters, including the dense fast-path window and
/// the parallel-path threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_min_common_users")]
    pub min_common_users: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
    /// Product count at which the sparse path goes parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    #[serde(default = "default_dense_min_products")]
    pub dense_min_products: usize,
    #[serde(default = "default_dense_max_products")]
    pub dense_max_products: usize,
    #[serde(default = "default_dense_min_density")]
    pub dense_min_density: f64,
    #[serde(default = "default_dense_max_density")]
    pub dense_max_density: f64,
    /// Upper bound on P*M cells for the dense incidence matrix.
    #[serde(default = "default_dense_max_cells")]
    pub dense_max_cells: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Promote a version even when the batch produced no records.
    #[serde(default = "default_promote_empty")]
    pub promote_empty: bool,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_warm_cache_limit")]
    pub warm_cache_limit: usize,
    /// TTL of the shared `rec:batch_version` pointer.
    #[serde(default = "default_batch_version_ttl_secs")]
    pub batch_version_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL of hot-cache entries (`recs:<pid>:<v>`).
    #[serde(default = "default_hot_ttl_secs")]
    pub hot_ttl_secs: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_min_common_users() -> usize {
    2
}
fn default_top_n() -> usize {
    10
}
fn default_parallel_workers() -> usize {
    4
}
fn default_parallel_threshold() -> usize {
    10_000
}
fn default_dense_min_products() -> usize {
    1_000
}
fn default_dense_max_products() -> usize {
    5_000
}
fn default_dense_min_density() -> f64 {
    0.01
}
fn default_dense_max_density() -> f64 {
    0.5
}
fn default_dense_max_cells() -> usize {
    50_000_000
}
fn default_min_support() -> f64 {
    0.01
}
fn default_min_confidence() -> f64 {
    0.1
}
fn default_promote_empty() -> bool {
    false
}
fn default_retry_attempts() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_warm_cache_limit() -> usize {
    100
}
fn default_batch_version_ttl_secs() -> u64 {
    3_600
}
fn default_redis_urls() -> Vec<String> {
    vec!["redis://localhost:6379".to_string()]
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_hot_ttl_secs() -> u64 {
    14_400
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_common_users: default_min_common_users(),
            top_n: default_top_n(),
            parallel_workers: default_parallel_workers(),
            parallel_threshold: default_parallel_threshold(),
            dense_min_products: default_dense_min_products(),
            dense_max_products: default_dense_max_products(),
            dense_min_density: default_dense_min_density(),
            dense_max_density: default_dense_max_density(),
            dense_max_cells: default_dense_max_cells(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            promote_empty: default_promote_empty(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            warm_cache_limit: default_warm_cache_limit(),
            batch_version_ttl_secs: default_batch_version_ttl_secs(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            urls: default_redis_urls(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl_secs: default_hot_ttl_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            engine: EngineConfig::default(),
            miner: MinerConfig::default(),
            batch: BatchConfig::default(),
            redis: RedisConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("RECS")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
