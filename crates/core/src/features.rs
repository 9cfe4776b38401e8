//! Numeric feature extraction from product attribute maps — the optional
//! cold-start collaborator. Missing or uncoercible values are imputed with
//! the per-attribute mean over the products that do carry the value.

use crate::types::{AttributeValue, Product};

/// Coerce a tagged attribute value to f64. `Text` coerces only when it
/// parses as a number.
pub fn as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Number(n) => Some(*n),
        AttributeValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
        AttributeValue::Text(s) => s.trim().parse::<f64>().ok(),
    }
}

/// Build per-product numeric vectors over `attribute_names`, in input order.
/// Returns one `(product_id, vector)` per product; vector length equals
/// `attribute_names.len()`.
pub fn numeric_features(
    products: &[Product],
    attribute_names: &[String],
) -> Vec<(String, Vec<f64>)> {
    // Per-attribute mean over present values, used to fill the gaps.
    let means: Vec<f64> = attribute_names
        .iter()
        .map(|name| {
            let values: Vec<f64> = products
                .iter()
                .filter_map(|p| p.attributes.get(name).and_then(as_f64))
                .collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        })
        .collect();

    products
        .iter()
        .map(|p| {
            let vector = attribute_names
                .iter()
                .zip(&means)
                .map(|(name, mean)| p.attributes.get(name).and_then(as_f64).unwrap_or(*mean))
                .collect();
            (p.id.clone(), vector)
        })
        .collect()
}
