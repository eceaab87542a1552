//! Short-lived "have we seen this already?" store used to skip replayed webhooks.
//!
//! This is an advisory aid. The authoritative guard against applying a payment twice is the status check inside the
//! payment transition's own transaction. A store that forgets entries early only costs a redundant (no-op) transition.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use moka::{future::Cache, Expiry};

#[allow(async_fn_in_trait)]
pub trait IdempotencyStore: Clone {
    /// True if `key` was recorded and has not expired.
    async fn contains(&self, key: &str) -> bool;

    /// Records `key` for `ttl` if it is not already present. Returns true if this call inserted it.
    ///
    /// This must be atomic: of several concurrent callers with the same key, exactly one sees `true`.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> bool;
}

struct PerEntryTtl;

impl Expiry<String, Duration> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, ttl: &Duration, _created_at: Instant) -> Option<Duration> {
        Some(*ttl)
    }
}

/// An in-process [`IdempotencyStore`] for single-instance deployments.
#[derive(Clone)]
pub struct MemoryIdempotencyStore {
    cache: Arc<Cache<String, Duration>>,
}

impl MemoryIdempotencyStore {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).expire_after(PerEntryTtl).build();
        Self { cache: Arc::new(cache) }
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    async fn contains(&self, key: &str) -> bool {
        self.cache.get(key).await.is_some()
    }

    async fn set_if_absent(&self, key: &str, ttl: Duration) -> bool {
        self.cache.entry(key.to_string()).or_insert(ttl).await.is_fresh()
    }
}
