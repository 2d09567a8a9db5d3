//! In-process store adapter.
//!
//! Expiry is lazy: dead entries are dropped when touched or when a pattern
//! scan walks past them.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::glob::glob_match;
use super::store::{CacheStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that have expired but were
    /// not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn deadline(now: Instant, ttl_seconds: u64) -> Result<Instant, StoreError> {
        now.checked_add(Duration::from_secs(ttl_seconds))
            .ok_or(StoreError::InvalidTtl)
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key)
            && entry.is_live(now)
        {
            return Some(entry.value.clone());
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_value(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), StoreError> {
        let expires_at = Self::deadline(Instant::now(), ttl_seconds)?;
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn del_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| entry.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_value(key).is_some())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Self::deadline(now, ttl_seconds)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
