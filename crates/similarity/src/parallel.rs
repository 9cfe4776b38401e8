//! Worker-parallel sparse path for large catalogs: the outer index range is
//! split into contiguous chunks, each worker keeps the global upper-triangle
//! discipline (`q > p`), and the driver owns every heap.

use crate::engine::score_pair;
use crate::heap::TopNHeap;
use crate::incidence::Incidence;
use recs_core::config::EngineConfig;
use recs_core::{RecsError, RecsResult};
use tracing::debug;

/// A worker's output: for each source product in its chunk, every viable
/// `(neighbour, score)` pair with `neighbour > source`. Lists are not
/// truncated here — a pair outside one source's top-N may still belong in
/// the neighbour's heap, and the neighbour can live in another chunk.
type WorkerOutput = Vec<(u32, Vec<(u32, f64)>)>;

pub(crate) fn compute(incidence: &Incidence, config: &EngineConfig) -> RecsResult<Vec<TopNHeap>> {
    let product_count = incidence.len();
    let workers = config.parallel_workers.max(1).min(product_count);
    let chunk_size = product_count.div_ceil(workers);

    debug!(
        products = product_count,
        workers,
        chunk_size,
        "Starting parallel similarity computation"
    );

    let min_common = config.min_common_users;
    let outputs: Vec<std::thread::Result<WorkerOutput>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .filter_map(|w| {
                let start = w * chunk_size;
                let end = ((w + 1) * chunk_size).min(product_count);
                if start >= end {
                    return None;
                }
                Some(scope.spawn(move || worker_chunk(incidence, start, end, min_common)))
            })
            .collect();
        handles.into_iter().map(|h| h.join()).collect()
    });

    let mut heaps = vec![TopNHeap::new(config.top_n); product_count];
    for output in outputs {
        let chunk = output.map_err(|_| RecsError::Parallel("worker panicked".to_string()))?;
        for (source, items) in chunk {
            for (neighbour, score) in items {
                heaps[source as usize].push(score, neighbour);
                heaps[neighbour as usize].push(score, source);
            }
        }
    }

    Ok(heaps)
}

/// Pure function over one chunk: incidence and chunk bounds in, per-source
/// pair lists out. No mutable state crosses the boundary.
fn worker_chunk(
    incidence: &Incidence,
    start: usize,
    end: usize,
    min_common: usize,
) -> WorkerOutput {
    let product_count = incidence.len();
    let mut output = Vec::new();

    for i in start..end {
        if incidence.set(i).len() < min_common {
            continue;
        }
        let mut items = Vec::new();
        for j in (i + 1)..product_count {
            if let Some(score) = score_pair(incidence.set(i), incidence.set(j), min_common) {
                items.push((j as u32, score));
            }
        }
        if !items.is_empty() {
            output.push((i as u32, items));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{heaps_to_map, SimilarityEngine};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use recs_core::types::Order;

    fn random_orders(seed: u64, orders: usize, buyers: usize, products: usize) -> Vec<Order> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..orders)
            .map(|i| {
                let basket = 1 + rng.gen_range(0..5);
                Order {
                    id: format!("o{i}"),
                    buyer_id: format!("u{:03}", rng.gen_range(0..buyers)),
                    product_ids: (0..basket)
                        .map(|_| format!("p{:03}", rng.gen_range(0..products)))
                        .collect(),
                }
            })
            .collect()
    }

    #[test]
    fn test_matches_sequential_path() {
        let orders = random_orders(3, 300, 60, 40);
        let incidence = Incidence::from_orders(&orders);
        let config = EngineConfig {
            min_common_users: 2,
            top_n: 5,
            parallel_workers: 4,
            ..EngineConfig::default()
        };

        let engine = SimilarityEngine::new(config.clone());
        let sequential = heaps_to_map(&incidence, engine.compute_sequential(&incidence));
        let parallel = heaps_to_map(&incidence, compute(&incidence, &config).unwrap());

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_more_workers_than_products() {
        let orders = random_orders(5, 20, 5, 3);
        let incidence = Incidence::from_orders(&orders);
        let config = EngineConfig {
            min_common_users: 1,
            top_n: 5,
            parallel_workers: 16,
            ..EngineConfig::default()
        };

        let engine = SimilarityEngine::new(config.clone());
        let sequential = heaps_to_map(&incidence, engine.compute_sequential(&incidence));
        let parallel = heaps_to_map(&incidence, compute(&incidence, &config).unwrap());

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_single_worker() {
        let orders = random_orders(9, 100, 20, 15);
        let incidence = Incidence::from_orders(&orders);
        let config = EngineConfig {
            min_common_users: 2,
            top_n: 3,
            parallel_workers: 1,
            ..EngineConfig::default()
        };

        let engine = SimilarityEngine::new(config.clone());
        let sequential = heaps_to_map(&incidence, engine.compute_sequential(&incidence));
        let parallel = heaps_to_map(&incidence, compute(&incidence, &config).unwrap());

        assert_eq!(sequential, parallel);
    }
}
