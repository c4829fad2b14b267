//! Cache system for result and counter buffering
//!
//! This crate provides key-value caching over pluggable backends
//! with atomic compare-and-swap, tag invalidation, and a typed
//! JSON manager facade.

pub mod errors;
pub mod manager;
pub mod params;
pub mod prelude;
pub mod store;

// Re-export centralized config
pub use config::CacheConfig;

pub use errors::CacheError;
pub use manager::CacheManager;
pub use params::{CacheParams, DEFAULT_PREFIX};
pub use store::{CacheStore, MemoryStore, RedisStore};
