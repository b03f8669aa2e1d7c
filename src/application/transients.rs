//! Cache-aside helper shared by the blog and post services.
//!
//! Transient failures never fail a request: a backend error or an undecodable
//! entry is logged and treated as a miss.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::application::error::AppError;
use crate::cache::{METRIC_TRANSIENT_HIT, METRIC_TRANSIENT_MISS, TransientKeys, TransientStore};

const TARGET: &str = "crossblog::transients";

#[derive(Clone)]
pub struct TransientCache {
    store: Arc<dyn TransientStore>,
    keys: TransientKeys,
}

impl TransientCache {
    pub fn new(store: Arc<dyn TransientStore>, keys: TransientKeys) -> Self {
        Self { store, keys }
    }

    pub fn key<P: Serialize>(&self, operation: &'static str, params: &P) -> Result<String, AppError> {
        self.keys.derive(operation, params).map_err(|err| {
            AppError::unexpected(format!("failed to serialize {operation} parameters: {err}"))
        })
    }

    pub async fn read<T: DeserializeOwned>(&self, operation: &'static str, key: &str) -> Option<T> {
        let value = match self.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                counter!(METRIC_TRANSIENT_MISS, "operation" => operation).increment(1);
                debug!(target: TARGET, operation, key, "Transient miss");
                return None;
            }
            Err(err) => {
                counter!(METRIC_TRANSIENT_MISS, "operation" => operation).increment(1);
                warn!(target: TARGET, operation, key, error = %err, "Transient read failed");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => {
                counter!(METRIC_TRANSIENT_HIT, "operation" => operation).increment(1);
                debug!(target: TARGET, operation, key, "Transient hit");
                Some(decoded)
            }
            Err(err) => {
                counter!(METRIC_TRANSIENT_MISS, "operation" => operation).increment(1);
                warn!(
                    target: TARGET,
                    operation,
                    key,
                    error = %err,
                    "Discarding undecodable transient"
                );
                self.evict(key).await;
                None
            }
        }
    }

    pub async fn write<T: Serialize>(
        &self,
        operation: &'static str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(target: TARGET, operation, key, error = %err, "Transient encode failed");
                return;
            }
        };

        match self.store.set(key, encoded, ttl).await {
            Ok(()) => debug!(
                target: TARGET,
                operation,
                key,
                ttl_secs = ttl.as_secs(),
                "Transient stored"
            ),
            Err(err) => warn!(target: TARGET, operation, key, error = %err, "Transient write failed"),
        }
    }

    pub async fn evict(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!(target: TARGET, key, error = %err, "Transient delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::{MemoryTransientStore, TransientConfig};

    fn cache() -> (TransientCache, Arc<MemoryTransientStore>) {
        let store = Arc::new(MemoryTransientStore::new(&TransientConfig::default()));
        (
            TransientCache::new(store.clone(), TransientKeys::default()),
            store,
        )
    }

    #[tokio::test]
    async fn write_then_read_returns_value() {
        let (cache, _) = cache();
        let key = cache.key("get_blogs", &json!({"blog_ids": [2]})).expect("key");

        cache
            .write("get_blogs", &key, &vec![1_i64, 2], Duration::from_secs(30))
            .await;

        let cached: Option<Vec<i64>> = cache.read("get_blogs", &key).await;
        assert_eq!(cached, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn empty_list_is_a_hit() {
        let (cache, _) = cache();
        cache
            .write("get_blogs", "k", &Vec::<i64>::new(), Duration::from_secs(30))
            .await;

        let cached: Option<Vec<i64>> = cache.read("get_blogs", "k").await;
        assert_eq!(cached, Some(Vec::new()));
    }

    #[tokio::test]
    async fn undecodable_entry_is_evicted() {
        let (cache, store) = cache();
        store
            .set("k", json!("not a list"), Duration::from_secs(30))
            .await
            .expect("set");

        let cached: Option<Vec<i64>> = cache.read("get_blogs", "k").await;
        assert!(cached.is_none());
        assert!(store.is_empty());
    }
}
