//! Redis store adapter backed by a `deadpool-redis` pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolSettings, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tracing::debug;

use super::store::{CacheStore, StoreError};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: u32 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreOptions {
    pub url: String,
    pub pool_size: usize,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Builds the pool without connecting; the first command opens a connection.
    pub fn connect(options: &RedisStoreOptions) -> Result<Self, StoreError> {
        let mut settings = PoolSettings::from_url(options.url.clone());
        let pool_config = settings
            .pool
            .get_or_insert_with(|| PoolConfig::new(options.pool_size.max(1)));
        pool_config.max_size = options.pool_size.max(1);
        pool_config.timeouts.wait = Some(options.timeout);
        pool_config.timeouts.create = Some(options.timeout);
        pool_config.timeouts.recycle = Some(options.timeout);

        let pool = settings
            .create_pool(Some(Runtime::Tokio1))
            .map_err(StoreError::unavailable)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool.get().await.map_err(StoreError::unavailable)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|err| StoreError::command("GET", err))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|err| StoreError::command("SETEX", err))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|err| StoreError::command("DEL", err))
    }

    /// Walks the keyspace with `SCAN` so large keyspaces never block the server.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|err| StoreError::command("SCAN", err))?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once.
        found.sort_unstable();
        found.dedup();
        debug!(pattern, matched = found.len(), "redis scan complete");
        Ok(found)
    }

    async fn del_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        conn.del::<_, u64>(keys)
            .await
            .map_err(|err| StoreError::command("DEL", err))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|err| StoreError::command("EXISTS", err))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        let seconds = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let mut conn = self.connection().await?;
        conn.expire::<_, bool>(key, seconds)
            .await
            .map_err(|err| StoreError::command("EXPIRE", err))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| StoreError::command("PING", err))
    }
}
