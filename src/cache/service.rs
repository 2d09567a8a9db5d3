//! Request-facing cache API.
//!
//! Every operation is fail-open: store faults, undecodable entries and an
//! absent store all degrade to "nothing cached". Reads report a miss and
//! writes report `false`; no cache fault ever reaches the caller as an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use super::config::{CacheBackend, CacheConfig, DEFAULT_TTL_SECONDS};
use super::memory::MemoryStore;
use super::redis_store::RedisStore;
use super::store::{CacheStore, StoreError};

pub const METRIC_CACHE_HIT: &str = "listings_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "listings_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "listings_cache_error_total";
pub const METRIC_CACHE_CLEAR_MS: &str = "listings_cache_clear_ms";

#[derive(Clone)]
pub struct CacheService {
    store: Option<Arc<dyn CacheStore>>,
    default_ttl: u64,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: u64) -> Self {
        Self {
            store: Some(store),
            default_ttl: default_ttl.max(1),
        }
    }

    /// A service with no store: every read misses, every write fails.
    pub fn disabled() -> Self {
        Self {
            store: None,
            default_ttl: DEFAULT_TTL_SECONDS,
        }
    }

    /// In-process store with the standard one hour TTL.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_TTL_SECONDS)
    }

    /// Builds the store selected by `config`. Only pool construction can fail;
    /// an unreachable Redis server surfaces later as per-operation faults.
    pub fn from_config(config: &CacheConfig) -> Result<Self, StoreError> {
        let ttl = config.default_ttl();
        let service = match config.backend() {
            CacheBackend::Disabled => Self {
                store: None,
                default_ttl: ttl,
            },
            CacheBackend::Memory => Self::new(Arc::new(MemoryStore::new()), ttl),
            CacheBackend::Redis(options) => Self::new(Arc::new(RedisStore::connect(&options)?), ttl),
        };
        Ok(service)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend(&self) -> &'static str {
        self.store
            .as_ref()
            .map_or("disabled", |store| store.backend())
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    /// Cached payload for `key`, or `None` on miss, fault or decode failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(raw) = self.fetch(key).await else {
            record_miss(key);
            return None;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                record_hit(key);
                Some(value)
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "decode").increment(1);
                warn!(key, error = %err, "discarding undecodable cache entry");
                record_miss(key);
                None
            }
        }
    }

    /// Raw stored text for `key`, without decoding.
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        let raw = self.fetch(key).await;
        if raw.is_some() {
            record_hit(key);
        } else {
            record_miss(key);
        }
        raw
    }

    /// Stores `value` under `key` with the default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl_seconds).await,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "encode").increment(1);
                warn!(key, error = %err, "payload is not serializable; skipping cache write");
                false
            }
        }
    }

    /// Stores pre-serialized JSON. A zero TTL is rejected.
    pub async fn set_raw(&self, key: &str, raw: String, ttl_seconds: u64) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        if ttl_seconds == 0 {
            return fault("set", key, &StoreError::InvalidTtl);
        }
        match store.set_ex(key, raw, ttl_seconds).await {
            Ok(()) => {
                debug!(key, ttl_seconds, "cache set");
                true
            }
            Err(err) => fault("set", key, &err),
        }
    }

    /// Removes `key`. An absent key counts as success.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.del(key).await {
            Ok(()) => true,
            Err(err) => fault("delete", key, &err),
        }
    }

    /// Deletes every key matching the glob `pattern` in one batch.
    /// Matching nothing is a successful no-op.
    #[instrument(level = "debug", skip(self))]
    pub async fn clear_pattern(&self, pattern: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let started_at = Instant::now();

        let keys = match store.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => return fault("clear_pattern", pattern, &err),
        };
        if keys.is_empty() {
            debug!(pattern, deleted = 0, "no cache keys matched");
            return true;
        }

        match store.del_many(&keys).await {
            Ok(deleted) => {
                histogram!(METRIC_CACHE_CLEAR_MS)
                    .record(started_at.elapsed().as_secs_f64() * 1000.0);
                debug!(pattern, matched = keys.len(), deleted, "cache pattern cleared");
                true
            }
            Err(err) => fault("clear_pattern", pattern, &err),
        }
    }

    /// `false` on miss and on any fault.
    pub async fn exists(&self, key: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.exists(key).await {
            Ok(found) => found,
            Err(err) => fault("exists", key, &err),
        }
    }

    /// Probes the store. A disabled cache reports no error.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match &self.store {
            Some(store) => store.ping().await,
            None => Ok(()),
        }
    }

    /// Resets the TTL of a live entry. `false` when absent or on fault.
    pub async fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        if ttl_seconds == 0 {
            return fault("expire", key, &StoreError::InvalidTtl);
        }
        match store.expire(key, ttl_seconds).await {
            Ok(updated) => updated,
            Err(err) => fault("expire", key, &err),
        }
    }

    /// Serves `key` from the cache, or runs `load` and caches its `Ok` value.
    ///
    /// Errors from `load` are returned untouched and nothing is cached for
    /// them. Concurrent misses on one key each run `load`; the last write wins.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: Option<u64>,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }
        let value = load().await?;
        self.set_with_ttl(key, &value, ttl_seconds.unwrap_or(self.default_ttl))
            .await;
        Ok(value)
    }

    async fn fetch(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                fault("get", key, &err);
                None
            }
        }
    }
}

fn record_hit(key: &str) {
    counter!(METRIC_CACHE_HIT).increment(1);
    debug!(key, outcome = "hit", "cache lookup");
}

fn record_miss(key: &str) {
    counter!(METRIC_CACHE_MISS).increment(1);
    debug!(key, outcome = "miss", "cache lookup");
}

/// Logs and counts a store fault; always yields `false`.
fn fault(op: &'static str, target: &str, err: &StoreError) -> bool {
    counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
    warn!(op, target, error = %err, "cache store fault; continuing without cache");
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;

    /// Store that rejects every command, as an unreachable server would.
    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        fn backend(&self) -> &'static str {
            "down"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn set_ex(&self, _: &str, _: String, _: u64) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn del(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn del_many(&self, _keys: &[String]) -> Result<u64, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn expire(&self, _key: &str, _ttl: u64) -> Result<bool, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Listing {
        id: u32,
        city: String,
    }

    fn listing() -> Listing {
        Listing {
            id: 7,
            city: "Pune".into(),
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = CacheService::in_memory();
        assert!(cache.set("property:7", &listing()).await);
        assert_eq!(cache.get::<Listing>("property:7").await, Some(listing()));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let cache = CacheService::in_memory();
        assert!(cache.set_with_ttl("property:7", &listing(), 1).await);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get::<Listing>("property:7").await, None);
    }

    #[tokio::test]
    async fn clear_pattern_leaves_other_namespaces_alone() {
        let cache = CacheService::in_memory();
        cache.set("properties:{\"page\":1}", &1).await;
        cache.set("properties:{\"page\":2}", &2).await;
        cache.set("property:123", &listing()).await;

        assert!(cache.clear_pattern("properties:*").await);

        assert_eq!(cache.get::<u32>("properties:{\"page\":1}").await, None);
        assert_eq!(cache.get::<u32>("properties:{\"page\":2}").await, None);
        assert_eq!(cache.get::<Listing>("property:123").await, Some(listing()));
    }

    #[tokio::test]
    async fn clear_pattern_without_matches_succeeds() {
        let cache = CacheService::in_memory();
        assert!(cache.clear_pattern("properties:*").await);
    }

    #[tokio::test]
    async fn store_faults_fail_open() {
        let cache = CacheService::new(Arc::new(DownStore), 60);

        assert_eq!(cache.get::<Listing>("property:7").await, None);
        assert!(!cache.set("property:7", &listing()).await);
        assert!(!cache.delete("property:7").await);
        assert!(!cache.clear_pattern("properties:*").await);
        assert!(!cache.exists("property:7").await);
        assert!(!cache.expire("property:7", 10).await);
    }

    #[tokio::test]
    async fn disabled_service_never_caches() {
        let cache = CacheService::disabled();
        assert!(!cache.is_enabled());
        assert!(!cache.set("k", &1).await);
        assert_eq!(cache.get::<u32>("k").await, None);
        assert_eq!(cache.backend(), "disabled");
    }

    #[tokio::test]
    async fn undecodable_entries_read_as_miss() {
        let cache = CacheService::in_memory();
        assert!(cache.set_raw("property:7", "not json".into(), 60).await);
        assert_eq!(cache.get::<Listing>("property:7").await, None);

        cache.set("property:8", &"a string").await;
        assert_eq!(cache.get::<Listing>("property:8").await, None);
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let cache = CacheService::in_memory();
        assert!(!cache.set_with_ttl("k", &1, 0).await);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn expire_and_exists_follow_entry_state() {
        let cache = CacheService::in_memory();
        assert!(!cache.exists("k").await);
        assert!(!cache.expire("k", 10).await);

        cache.set("k", &1).await;
        assert!(cache.exists("k").await);
        assert!(cache.expire("k", 10).await);
        assert!(cache.delete("k").await);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn read_through_loads_once_then_serves_cache() {
        let cache = CacheService::in_memory();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<Listing, ()> = cache
                .read_through("property:7", None, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(listing())
                })
                .await;
            assert_eq!(value, Ok(listing()));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_through_propagates_loader_errors_without_caching() {
        let cache = CacheService::in_memory();

        let result: Result<Listing, &str> = cache
            .read_through("property:9", None, || async { Err("not found") })
            .await;

        assert_eq!(result, Err("not found"));
        assert!(!cache.exists("property:9").await);
    }

    #[tokio::test]
    async fn read_through_falls_back_to_loader_when_store_is_down() {
        let cache = CacheService::new(Arc::new(DownStore), 60);
        let result: Result<Listing, ()> = cache
            .read_through("property:7", None, || async { Ok(listing()) })
            .await;
        assert_eq!(result, Ok(listing()));
    }

    #[tokio::test]
    async fn oversized_ttl_fails_open() {
        let cache = CacheService::in_memory();
        assert!(!cache.set_with_ttl("property:1", &1u32, u64::MAX).await);
        assert!(cache.get::<u32>("property:1").await.is_none());

        assert!(cache.set("property:1", &1u32).await);
        assert!(!cache.expire("property:1", u64::MAX).await);
        assert_eq!(cache.get::<u32>("property:1").await, Some(1));

        let huge_default = CacheService::new(Arc::new(MemoryStore::new()), u64::MAX);
        let result: Result<Listing, ()> = huge_default
            .read_through("property:7", None, || async { Ok(listing()) })
            .await;
        assert_eq!(result, Ok(listing()));
    }

    #[test]
    fn from_config_selects_backend() {
        let memory = CacheService::from_config(&CacheConfig::default()).expect("memory");
        assert_eq!(memory.backend(), "memory");
        assert_eq!(memory.default_ttl(), 3600);

        let disabled = CacheService::from_config(&CacheConfig {
            enabled: false,
            default_ttl_seconds: 120,
            ..Default::default()
        })
        .expect("disabled");
        assert_eq!(disabled.backend(), "disabled");
        assert_eq!(disabled.default_ttl(), 120);
    }
}
