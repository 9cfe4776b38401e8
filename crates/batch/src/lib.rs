//! Batch orchestration — drives the recommendation jobs end to end and
//! owns the promotion and warm-up protocol.

#![warn(clippy::unwrap_used)]

pub mod orchestrator;
pub mod quality;

pub use orchestrator::{BatchOrchestrator, BatchReport, JobKind};
pub use quality::compute_quality;
