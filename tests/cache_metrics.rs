use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use uuid::Uuid;

use listings::cache::{
    CacheService, CacheStore, Invalidator, METRIC_CACHE_CLEAR_MS, METRIC_CACHE_ERROR,
    METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE_MS, METRIC_CACHE_MISS, Mutation, StoreError,
};

/// Runs `body` on a current-thread runtime with a thread-local recorder.
fn with_recorder<F>(body: F) -> Snapshotter
where
    F: AsyncFnOnce(),
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    metrics::with_local_recorder(&recorder, || runtime.block_on(body()));
    snapshotter
}

/// `name{label=value,...}` -> value, counters and histogram sample counts only.
fn collect(snapshotter: &Snapshotter) -> HashMap<String, u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let key = composite_key.key();
            let mut labels: Vec<String> = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            labels.sort();
            let name = if labels.is_empty() {
                key.name().to_string()
            } else {
                format!("{}{{{}}}", key.name(), labels.join(","))
            };
            let value = match value {
                DebugValue::Counter(count) => count,
                DebugValue::Histogram(samples) => samples.len() as u64,
                DebugValue::Gauge(_) => 0,
            };
            (name, value)
        })
        .collect()
}

struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    fn backend(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: u64) -> Result<(), StoreError> {
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

#[test]
fn reads_emit_hit_and_miss_counters() {
    let snapshotter = with_recorder(async || {
        let cache = CacheService::in_memory();
        assert!(cache.get::<serde_json::Value>("property:1").await.is_none());
        assert!(cache.set("property:1", &json!({ "id": 1 })).await);
        assert!(cache.get::<serde_json::Value>("property:1").await.is_some());
        assert!(cache.get::<serde_json::Value>("property:1").await.is_some());
    });

    let metrics = collect(&snapshotter);
    assert_eq!(metrics.get(METRIC_CACHE_MISS), Some(&1));
    assert_eq!(metrics.get(METRIC_CACHE_HIT), Some(&2));
    assert!(!metrics.keys().any(|name| name.starts_with(METRIC_CACHE_ERROR)));
}

#[test]
fn store_faults_are_counted_per_operation() {
    let snapshotter = with_recorder(async || {
        let cache = CacheService::new(Arc::new(DownStore), 60);
        assert!(cache.get::<serde_json::Value>("property:1").await.is_none());
        assert!(!cache.set("property:1", &json!(1)).await);
        assert!(!cache.clear_pattern("properties:*").await);
    });

    let metrics = collect(&snapshotter);
    assert_eq!(metrics.get(&format!("{METRIC_CACHE_ERROR}{{op=get}}")), Some(&1));
    assert_eq!(metrics.get(&format!("{METRIC_CACHE_ERROR}{{op=set}}")), Some(&1));
    assert!(
        metrics
            .keys()
            .any(|name| name.starts_with(METRIC_CACHE_ERROR) && name.contains("op=clear")),
        "clear fault not counted: {metrics:?}"
    );
}

#[test]
fn invalidation_records_latency() {
    let snapshotter = with_recorder(async || {
        let cache = CacheService::in_memory();
        cache.set("properties:{}", &json!([])).await;
        cache.set("property:1", &json!({})).await;

        let outcome = Invalidator::new(cache.clone())
            .apply(Mutation::PropertyUpdated {
                property_id: Uuid::new_v4(),
            })
            .await;
        assert!(outcome.is_complete());
        assert!(!cache.exists("properties:{}").await);
    });

    let metrics = collect(&snapshotter);
    assert!(
        metrics
            .iter()
            .any(|(name, count)| name.starts_with(METRIC_CACHE_INVALIDATE_MS) && *count == 1),
        "missing invalidation histogram: {metrics:?}"
    );
    assert!(
        metrics
            .iter()
            .any(|(name, count)| name.starts_with(METRIC_CACHE_CLEAR_MS) && *count >= 1),
        "missing clear histogram: {metrics:?}"
    );
}
