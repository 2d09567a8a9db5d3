//! Key-value store adapter contract.
//!
//! Adapters report every fault as a [`StoreError`]; turning faults into
//! misses is the job of [`super::CacheService`], not of the adapter.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    #[error("ttl must be at least one second and representable")]
    InvalidTtl,
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Minimal surface of a TTL-aware key-value store with glob enumeration.
///
/// TTLs are whole seconds and always positive; callers validate before
/// reaching the adapter.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Removing an absent key succeeds.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// All live keys matching a glob pattern (`*`, `?`, `[...]`, `\` escapes).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Removes the given keys in one batch and returns how many existed.
    async fn del_many(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Resets the TTL of a live key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError>;

    /// Reachability probe. In-process stores are always reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
