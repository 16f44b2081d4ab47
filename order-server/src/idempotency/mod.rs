//! Webhook idempotency markers
//!
//! A marker keyed by the gateway event ID means "this event was applied".
//! Markers expire after a TTL; re-applying an expired event is still safe
//! because payment transitions are naturally idempotent.

#[cfg(feature = "redis")]
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn seen(&self, key: &str) -> Result<bool, BoxError>;

    async fn mark(&self, key: &str, ttl: Duration) -> Result<(), BoxError>;

    /// Atomic check-and-set: `true` when this caller claimed the key
    async fn try_mark(&self, key: &str, ttl: Duration) -> Result<bool, BoxError>;

    /// Drop a claim so a redelivery can retry
    async fn release(&self, key: &str) -> Result<(), BoxError>;
}

/// In-process marker store (single instance deployments)
#[derive(Clone, Default)]
pub struct MemoryIdempotencyStore {
    /// key -> expiry
    markers: Arc<DashMap<String, Instant>>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired markers
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.markers.retain(|_, expires_at| *expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn seen(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self
            .markers
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn mark(&self, key: &str, ttl: Duration) -> Result<(), BoxError> {
        self.markers.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn try_mark(&self, key: &str, ttl: Duration) -> Result<bool, BoxError> {
        let now = Instant::now();
        // The entry guard holds the shard lock, so check-and-set is atomic
        let mut entry = self.markers.entry(key.to_string()).or_insert(now);
        if *entry > now {
            return Ok(false);
        }
        *entry = now + ttl;
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), BoxError> {
        self.markers.remove(key);
        Ok(())
    }
}
