#![warn(clippy::unwrap_used)]

pub mod client;
pub mod kv;
pub mod local;

pub use client::RedisKv;
pub use kv::KvStore;
pub use local::InMemoryKv;
