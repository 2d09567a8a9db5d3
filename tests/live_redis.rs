//! Redis adapter against a real server.
//!
//! Ignored by default. Run with
//! `LISTINGS_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test --test live_redis -- --ignored`.
//! Every test works under a random key prefix and cleans up after itself.

use std::time::Duration;

use listings::cache::{CacheService, CacheStore, RedisStore, RedisStoreOptions};
use serde_json::json;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("LISTINGS_TEST_REDIS_URL")
        .expect("LISTINGS_TEST_REDIS_URL must point at a disposable redis server")
}

fn store() -> RedisStore {
    RedisStore::connect(&RedisStoreOptions {
        url: redis_url(),
        pool_size: 4,
        timeout: Duration::from_secs(2),
    })
    .expect("redis pool")
}

fn prefix() -> String {
    format!("listings-test-{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires LISTINGS_TEST_REDIS_URL"]
async fn ping_and_basic_commands() {
    let store = store();
    store.ping().await.expect("ping");

    let key = format!("{}:property:1", prefix());
    store
        .set_ex(&key, "{\"id\":1}".into(), 60)
        .await
        .expect("set");
    assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("{\"id\":1}"));
    assert!(store.exists(&key).await.expect("exists"));
    assert!(store.expire(&key, 120).await.expect("expire"));

    store.del(&key).await.expect("del");
    assert!(!store.exists(&key).await.expect("exists after del"));
    assert!(!store.expire(&key, 120).await.expect("expire absent"));
}

#[tokio::test]
#[ignore = "requires LISTINGS_TEST_REDIS_URL"]
async fn scan_based_clear_only_touches_matching_keys() {
    let prefix = prefix();
    let cache = CacheService::new(std::sync::Arc::new(store()), 60);

    for page in 1..=30 {
        assert!(cache.set(&format!("{prefix}:properties:{page}"), &json!([page])).await);
    }
    let survivor = format!("{prefix}:property:1");
    assert!(cache.set(&survivor, &json!({ "id": 1 })).await);

    assert!(cache.clear_pattern(&format!("{prefix}:properties:*")).await);
    assert!(!cache.exists(&format!("{prefix}:properties:7")).await);
    assert!(cache.exists(&survivor).await);

    assert!(cache.delete(&survivor).await);
}

#[tokio::test]
#[ignore = "requires LISTINGS_TEST_REDIS_URL"]
async fn entries_expire_server_side() {
    let cache = CacheService::new(std::sync::Arc::new(store()), 60);
    let key = format!("{}:property:ttl", prefix());

    assert!(cache.set_with_ttl(&key, &json!(1), 1).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(cache.get::<serde_json::Value>(&key).await.is_none());
}
