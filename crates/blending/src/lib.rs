//! Hybrid blending — context-aware channel weights and per-product score
//! merges with breakdown synthesis.

#![warn(clippy::unwrap_used)]

pub mod blender;

pub use blender::{blend, boost_new_products, resolve_weights, BlendContext};
