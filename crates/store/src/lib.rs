//! Repository facade — typed interfaces over the durable catalog, order,
//! and recommendation stores, plus in-memory implementations.

#![warn(clippy::unwrap_used)]

pub mod memory;
pub mod repository;

pub use memory::{InMemoryOrderStore, InMemoryRecommendationStore};
pub use repository::{OrderRepository, RecommendationRepository};
