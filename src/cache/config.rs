//! Cache configuration.
//!
//! Selects the store backend and the default entry lifetime.

use std::time::Duration;

use serde::Deserialize;

use super::redis_store::RedisStoreOptions;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_REDIS_POOL_SIZE: usize = 16;
const DEFAULT_REDIS_TIMEOUT_MS: u64 = 1000;

/// Which store, if any, backs the cache service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Disabled,
    Memory,
    Redis(RedisStoreOptions),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off every read misses and every write is a no-op.
    pub enabled: bool,
    /// Redis endpoint. Unset selects the in-process store.
    pub redis_url: Option<String>,
    /// Lifetime of entries stored without an explicit TTL.
    pub default_ttl_seconds: u64,
    pub redis_pool_size: usize,
    /// Applies to pool waits, connects and recycles.
    pub redis_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            redis_pool_size: DEFAULT_REDIS_POOL_SIZE,
            redis_timeout_ms: DEFAULT_REDIS_TIMEOUT_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            redis_url: settings.redis_url.clone(),
            default_ttl_seconds: settings.default_ttl_seconds.get(),
            redis_pool_size: settings.redis_pool_size.get() as usize,
            redis_timeout_ms: settings.redis_timeout_ms.get(),
        }
    }
}

impl CacheConfig {
    pub fn backend(&self) -> CacheBackend {
        if !self.enabled {
            return CacheBackend::Disabled;
        }
        match self.redis_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => CacheBackend::Redis(RedisStoreOptions {
                url: url.to_string(),
                pool_size: self.redis_pool_size.max(1),
                timeout: Duration::from_millis(self.redis_timeout_ms.max(1)),
            }),
            _ => CacheBackend::Memory,
        }
    }

    /// Default TTL, clamped to at least one second.
    pub fn default_ttl(&self) -> u64 {
        self.default_ttl_seconds.max(1)
    }
}
