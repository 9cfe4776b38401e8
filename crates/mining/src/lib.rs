//! Association-rule mining — support/confidence/lift rule generation from
//! pairwise order co-occurrence.

#![warn(clippy::unwrap_used)]

pub mod miner;

pub use miner::{frequently_bought_with, RuleMiner};
