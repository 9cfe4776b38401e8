//! Recs Engine — offline product-recommendation pipeline with versioned
//! publication.
//!
//! Batch driver: loads order/catalog fixtures, runs the recommendation
//! jobs, and manages the version pointers.

use clap::{Parser, Subcommand, ValueEnum};
use recs_batch::{BatchOrchestrator, JobKind};
use recs_cache::{InMemoryKv, KvStore, RedisKv};
use recs_core::config::AppConfig;
use recs_core::types::{Order, Product, RecommendationRecord};
use recs_store::{InMemoryOrderStore, InMemoryRecommendationStore, RecommendationRepository};
use recs_versioning::{hot_cache_key, VersionRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "recs-engine")]
#[command(about = "Offline product-recommendation pipeline with versioned publication")]
#[command(version)]
struct Cli {
    /// Use a Redis-backed registry/cache instead of process memory
    #[arg(long, env = "RECS__REDIS__URL", global = true)]
    redis: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single batch job against order fixtures
    Run {
        job: Job,

        /// Orders JSON file: [{"id", "buyer_id", "product_ids"}]
        #[arg(long)]
        orders: PathBuf,

        /// Optional catalog JSON file: [{"id", "category", "attributes"}]
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Run collaborative, association, and hybrid jobs in order
    Pipeline {
        #[arg(long)]
        orders: PathBuf,

        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Swap the current and previous versions
    Rollback,
    /// Print the stored record for a product under the active version
    Show {
        product_id: String,

        /// Version tag (defaults to the active version)
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Job {
    Collaborative,
    Association,
    Hybrid,
}

impl From<Job> for JobKind {
    fn from(job: Job) -> Self {
        match job {
            Job::Collaborative => JobKind::Collaborative,
            Job::Association => JobKind::Association,
            Job::Hybrid => JobKind::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recs_engine=info,recs_batch=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let kv: Arc<dyn KvStore> = match &cli.redis {
        Some(url) => {
            let mut redis_config = config.redis.clone();
            redis_config.urls = vec![url.clone()];
            Arc::new(RedisKv::new(&redis_config).await?)
        }
        None => Arc::new(InMemoryKv::new()),
    };
    let registry = Arc::new(VersionRegistry::new(kv.clone()));
    let recommendations = Arc::new(InMemoryRecommendationStore::new());

    match cli.command {
        Command::Run {
            job,
            orders,
            catalog,
        } => {
            let orchestrator = build_orchestrator(
                &config,
                &orders,
                catalog.as_deref(),
                recommendations,
                registry,
                kv,
            )?;
            let report = orchestrator.run(job.into()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Pipeline { orders, catalog } => {
            let orchestrator = build_orchestrator(
                &config,
                &orders,
                catalog.as_deref(),
                recommendations,
                registry,
                kv,
            )?;
            for job in [JobKind::Collaborative, JobKind::Association, JobKind::Hybrid] {
                let report = orchestrator.run(job).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Rollback => {
            let (current, previous) = registry.rollback().await?;
            println!("current: {current}");
            println!("previous: {previous}");
        }
        Command::Show {
            product_id,
            version,
        } => {
            let version = match version {
                Some(version) => version,
                None => registry
                    .current_version()
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("no active version"))?,
            };
            // The repository is authoritative (and prefers the hybrid
            // record); the warm cache only covers promoted records for the
            // first `warm_cache_limit` catalog products, so it serves as a
            // fallback, not as the source of truth.
            let record = match recommendations.find(&product_id, &version).await? {
                Some(record) => Some(record),
                None => match kv.get(&hot_cache_key(&product_id, &version)).await? {
                    Some(json) => Some(serde_json::from_str::<RecommendationRecord>(&json)?),
                    None => None,
                },
            };
            match record {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("no record for {product_id} under {version}"),
            }
        }
    }

    Ok(())
}

fn build_orchestrator(
    config: &AppConfig,
    orders_path: &std::path::Path,
    catalog_path: Option<&std::path::Path>,
    recommendations: Arc<InMemoryRecommendationStore>,
    registry: Arc<VersionRegistry>,
    kv: Arc<dyn KvStore>,
) -> anyhow::Result<BatchOrchestrator> {
    let order_store = Arc::new(InMemoryOrderStore::new());

    let orders: Vec<Order> = serde_json::from_str(&std::fs::read_to_string(orders_path)?)?;
    info!(orders = orders.len(), path = %orders_path.display(), "Loaded order fixtures");

    match catalog_path {
        Some(path) => {
            let products: Vec<Product> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            info!(products = products.len(), path = %path.display(), "Loaded catalog fixtures");
            for product in products {
                order_store.insert_product(product);
            }
        }
        None => {
            // No catalog file: every product seen in an order is the catalog.
            let mut seen = std::collections::BTreeSet::new();
            for order in &orders {
                for pid in &order.product_ids {
                    seen.insert(pid.clone());
                }
            }
            for id in seen {
                order_store.insert_product(Product {
                    id,
                    category: None,
                    attributes: Default::default(),
                });
            }
        }
    }
    order_store.insert_orders(orders);

    Ok(BatchOrchestrator::new(
        config.clone(),
        order_store,
        recommendations,
        registry,
        kv,
    ))
}
