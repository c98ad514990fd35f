//! Read-through cache collaborator.
//!
//! The cache is advisory: every repository write invalidates the keys it
//! touches, and correctness never depends on a hit. `NoopCache` is the
//! default; `MemoryCache` is a moka-backed in-process implementation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Cache key for the full account hierarchy.
pub const ACCOUNT_HIERARCHY_KEY: &str = "accounts:hierarchy";

/// Cache-aside interface keyed by query signature.
pub trait Cache: Send + Sync {
    /// Returns the cached value for a key, if present and fresh.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value under a key.
    fn set(&self, key: &str, value: Value);

    /// Removes a single key.
    fn invalidate(&self, key: &str);

    /// Removes everything.
    fn invalidate_all(&self);
}

/// Cache that stores nothing. Used when caching is disabled and in
/// correctness tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value) {}

    fn invalidate(&self, _key: &str) {}

    fn invalidate_all(&self) {}
}

/// In-process cache backed by moka with bounded capacity and TTL.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: moka::sync::Cache<String, Value>,
}

impl MemoryCache {
    /// Creates a cache with the given capacity and time-to-live.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: moka::sync::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) {
        self.inner.insert(key.to_string(), value);
    }

    fn invalidate(&self, key: &str) {
        self.inner.invalidate(key);
    }

    fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

/// Builds the configured cache: moka when enabled, no-op otherwise.
#[must_use]
pub fn from_config(config: &keelbook_shared::config::CacheConfig) -> Arc<dyn Cache> {
    if config.enabled {
        Arc::new(MemoryCache::new(
            config.capacity,
            Duration::from_secs(config.ttl_secs),
        ))
    } else {
        Arc::new(NoopCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        cache.set("k", json!(1));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.set("k", json!({"a": 1}));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));

        cache.invalidate("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_invalidate_all_clears_everything() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.invalidate_all();
        // moka invalidation is eventually consistent for iteration but
        // immediate for get-after-invalidate_all on the same thread.
        cache.inner.run_pending_tasks();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
    }
}
