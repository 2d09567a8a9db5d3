//! Listing cache layer.
//!
//! A read-through, write-invalidate cache in front of the catalog store:
//!
//! - **Store adapters** ([`CacheStore`]): Redis or in-process, TTL aware,
//!   with glob key enumeration
//! - **Service** ([`CacheService`]): fail-open JSON get/set/delete/clear
//! - **Key scheme** ([`keys`]): entity, collection and per-user keys
//! - **Invalidation** ([`Invalidator`]): mutation → patterns rule table
//! - **Middleware** ([`read_through_layer`]): response caching for GET routes
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! redis_url = "redis://127.0.0.1:6379"   # omit for the in-process store
//! default_ttl_seconds = 3600
//! ```

mod config;
mod glob;
mod invalidation;
pub mod keys;
mod memory;
mod middleware;
mod redis_store;
mod service;
mod store;

pub use config::{CacheBackend, CacheConfig, DEFAULT_TTL_SECONDS};
pub use glob::{escape_glob, glob_match};
pub use invalidation::{
    InvalidationOutcome, InvalidationPlan, Invalidator, METRIC_CACHE_INVALIDATE_MS, Mutation,
};
pub use memory::MemoryStore;
pub use middleware::{CACHE_STATUS_HEADER, KeyFn, ReadThroughState, read_through_layer};
pub use redis_store::{RedisStore, RedisStoreOptions};
pub use service::{
    CacheService, METRIC_CACHE_CLEAR_MS, METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
};
pub use store::{CacheStore, StoreError};
