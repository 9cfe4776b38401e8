//! Versioned-publication protocol — rolling version pointers, metadata
//! records, and the shared batch-version handle.

#![warn(clippy::unwrap_used)]

pub mod registry;

pub use registry::{
    hot_cache_key, version_metadata_key, VersionRegistry, ARCHIVED_VERSION_KEY,
    BATCH_VERSION_KEY, CURRENT_VERSION_KEY, PREVIOUS_VERSION_KEY,
};
