//! Transient storage gateway.
//!
//! `TransientStore` is the get/set/delete-with-TTL contract the services cache through.
//! `MemoryTransientStore` keeps entries in a bounded LRU with per-entry expiry.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use thiserror::Error;

use super::config::TransientConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Longest lifetime any store keeps an entry; longer requests are shortened to it.
pub const MAX_TRANSIENT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum TransientError {
    #[error("transient backend error: {0}")]
    Backend(String),
}

impl TransientError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Returns the stored value unless it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, TransientError>;

    /// Stores `value` for `ttl`, replacing any previous entry.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), TransientError>;

    async fn delete(&self, key: &str) -> Result<(), TransientError>;
}

struct TransientEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process transient store with LRU eviction.
pub struct MemoryTransientStore {
    entries: RwLock<LruCache<String, TransientEntry>>,
}

impl MemoryTransientStore {
    pub fn new(config: &TransientConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, TransientError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }

        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), TransientError> {
        let expires_at = Instant::now()
            .checked_add(ttl.min(MAX_TRANSIENT_TTL))
            .ok_or_else(|| TransientError::backend("transient lifetime out of range"))?;
        let entry = TransientEntry { value, expires_at };
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TransientError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}
