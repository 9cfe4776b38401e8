use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A catalog product. Attributes are only consumed by the numeric feature
/// extractor; the recommendation pipeline itself keys everything off `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

/// A tagged product attribute value. Coercion to f64 is explicit and lossy
/// (see `features::as_f64`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

/// A purchase order. Quantities and prices are irrelevant to the pipeline;
/// only the buyer and the product set matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub product_ids: Vec<String>,
}

/// Pairwise order co-occurrence counts, symmetric, self-pairs excluded.
pub type CoOccurrence = HashMap<String, HashMap<String, u64>>;

/// Distinct-order count per product. Tracked independently of the
/// buyer incidence; authoritative for the association miner.
pub type ProductFrequencies = HashMap<String, u64>;

/// Which algorithm produced a recommendation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Collaborative,
    Association,
    Hybrid,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Collaborative => "collaborative",
            Algorithm::Association => "association",
            Algorithm::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bare (product, score) pair as produced by the similarity engine and
/// the rule miner, before breakdown synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub product_id: String,
    pub score: f64,
}

impl ScoredItem {
    pub fn new(product_id: impl Into<String>, score: f64) -> Self {
        Self {
            product_id: product_id.into(),
            score,
        }
    }
}

/// Channel weights applied during blending. Invariant: sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub collaborative: f64,
    pub association: f64,
}

impl BlendWeights {
    pub fn new(collaborative: f64, association: f64) -> Self {
        Self {
            collaborative,
            association,
        }
    }

    pub fn sum(&self) -> f64 {
        self.collaborative + self.association
    }
}

/// Per-consequent score breakdown. A channel that contributed no entry for
/// the consequent is absent, not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborative: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<f64>,
    pub blended_score: f64,
    pub weights: BlendWeights,
}

impl ScoreBreakdown {
    /// Breakdown for a pure-collaborative record: the absent association
    /// channel stays `None`.
    pub fn collaborative_only(score: f64) -> Self {
        Self {
            collaborative: Some(score),
            association: None,
            blended_score: score,
            weights: BlendWeights::new(1.0, 0.0),
        }
    }

    /// Breakdown for a pure-association record.
    pub fn association_only(score: f64) -> Self {
        Self {
            collaborative: None,
            association: Some(score),
            blended_score: score,
            weights: BlendWeights::new(0.0, 1.0),
        }
    }
}

/// One recommended consequent inside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub product_id: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// The persisted recommendation document, addressed by `(product_id, version)`.
/// Invariants: the source product never appears in `items`; scores are
/// non-increasing; `items.len()` is bounded by the configured top-N.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub product_id: String,
    pub algorithm: Algorithm,
    pub items: Vec<RecommendedItem>,
    pub version: String,
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An association rule `antecedent → consequent` with the standard metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: String,
    pub consequent: String,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Quality gates computed over a full record set before promotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub avg_score: f64,
    pub coverage: f64,
    pub diversity: f64,
}

impl QualityMetrics {
    pub fn zero() -> Self {
        Self {
            avg_score: 0.0,
            coverage: 0.0,
            diversity: 0.0,
        }
    }
}

/// Lifecycle state of a published version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Active,
    Previous,
    Archived,
}

/// Metadata stored under `rec:version:<v>` at promotion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub status: VersionStatus,
    pub quality: QualityMetrics,
}

/// Progress of a batch run. Transitions are strictly forward; only
/// `Promoted` rotates the version pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Allocated,
    Computing,
    Persisted,
    Validated,
    Promoted,
    Warmed,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchState::Allocated => "allocated",
            BatchState::Computing => "computing",
            BatchState::Persisted => "persisted",
            BatchState::Validated => "validated",
            BatchState::Promoted => "promoted",
            BatchState::Warmed => "warmed",
        };
        f.write_str(s)
    }
}
