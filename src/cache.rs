//! # Object Cache
//!
//! A best-effort key/value cache mapping opaque identifiers (DIDs, VP URLs)
//! to JSON blobs with a TTL. Correctness never depends on a cache hit —
//! every cached value is reproducible by re-fetching and re-parsing the
//! underlying resource — so the trait is intentionally thin and
//! infallible-on-miss.
//!
//! Connection management for a real backing store (Redis, ...) is left to
//! the deployment; this module defines the contract the core consumes plus
//! an in-process reference implementation good enough for a single-instance
//! deployment and for tests.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Cache key prefix for resolved objects (DID Documents, VP envelopes).
pub const OBJ_PREFIX: &str = "resolver:obj:";

/// Cache key prefix for scalar state values.
pub const STATE_PREFIX: &str = "resolver:state:";

/// Builds the object-cache key for a DID or URL.
#[must_use]
pub fn obj_key(id_or_url: &str) -> String {
    format!("{OBJ_PREFIX}{id_or_url}")
}

/// Builds the scalar-state cache key for `name`.
#[must_use]
pub fn state_key(name: &str) -> String {
    format!("{STATE_PREFIX}{name}")
}

/// Best-effort object cache. All methods return `Ok` for "not present" (as
/// `None`) rather than distinguishing "miss" from "backend unavailable" —
/// callers treat both the same way: re-derive the value from its source of
/// truth.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Fetches and deserializes the value at `key`, if present and unexpired.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T>;

    /// Serializes and stores `value` at `key` with the given TTL.
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration);

    /// Removes `key`, if present. Used to proactively invalidate DID
    /// Documents for DIDs affected by a new block.
    async fn invalidate(&self, key: &str);
}

struct Entry {
    value: Value,
    expires_at: SystemTime,
}

/// An in-process cache backed by a concurrent hash map, suitable for a
/// single-instance deployment and for tests. Production deployments would
/// point `ObjectCache` at a shared Redis instance instead.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly stale) entries, for diagnostics/tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ObjectCache for InMemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.expires_at < SystemTime::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        let Ok(value) = serde_json::to_value(value) else { return };
        self.entries.insert(
            key.to_string(),
            Entry { value, expires_at: SystemTime::now() + ttl },
        );
    }

    async fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_value() {
        let cache = InMemoryCache::new();
        cache.set(&obj_key("did:web:acme.example.com"), &"hello", Duration::from_secs(60)).await;
        let got: Option<String> = cache.get(&obj_key("did:web:acme.example.com")).await;
        assert_eq!(got.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let cache = InMemoryCache::new();
        cache.set("k", &42, Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let got: Option<i32> = cache.get("k").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = InMemoryCache::new();
        cache.set("k", &42, Duration::from_secs(60)).await;
        cache.invalidate("k").await;
        let got: Option<i32> = cache.get("k").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn miss_is_none_not_error() {
        let cache = InMemoryCache::new();
        let got: Option<i32> = cache.get("absent").await;
        assert!(got.is_none());
    }
}
