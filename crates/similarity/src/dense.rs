//! Dense fast path: binary incidence matrix `X` and Gram matrix `G = X·Xᵀ`
//! giving all pairwise intersection counts in one multiplication.

use crate::heap::TopNHeap;
use crate::incidence::Incidence;
use ndarray::Array2;
use recs_core::config::EngineConfig;
use recs_core::{RecsError, RecsResult};
use tracing::debug;

/// Compute per-product heaps through the Gram matrix. Counts are integers
/// represented exactly in f64, and the score division matches the sparse
/// path operand-for-operand, so results are identical.
pub(crate) fn compute(incidence: &Incidence, config: &EngineConfig) -> RecsResult<Vec<TopNHeap>> {
    let products = incidence.len();
    let buyers = incidence.buyer_count();

    let cells = products
        .checked_mul(buyers)
        .ok_or_else(|| RecsError::Internal(anyhow::anyhow!("incidence matrix size overflow")))?;
    if cells > config.dense_max_cells {
        return Err(RecsError::Internal(anyhow::anyhow!(
            "incidence matrix {}x{} exceeds the {}-cell budget",
            products,
            buyers,
            config.dense_max_cells
        )));
    }

    debug!(products, buyers, "Building dense incidence matrix");

    let mut x = Array2::<f64>::zeros((products, buyers));
    for i in 0..products {
        for &buyer in incidence.set(i).as_slice() {
            x[[i, buyer as usize]] = 1.0;
        }
    }

    let gram = x.dot(&x.t());

    let min_common = config.min_common_users;
    let mut heaps = vec![TopNHeap::new(config.top_n); products];

    for i in 0..products {
        let size_i = incidence.set(i).len();
        if size_i < min_common {
            continue;
        }
        for j in (i + 1)..products {
            let size_j = incidence.set(j).len();
            if size_j < min_common {
                continue;
            }
            // Exact: an intersection count is a small integer in f64.
            let intersection = gram[[i, j]] as usize;
            if intersection < min_common {
                continue;
            }
            let union = size_i + size_j - intersection;
            if union == 0 {
                continue;
            }
            let score = intersection as f64 / union as f64;
            heaps[i].push(score, j as u32);
            heaps[j].push(score, i as u32);
        }
    }

    Ok(heaps)
}
