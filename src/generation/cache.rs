// src/generation/cache.rs

use std::time::Duration;

use tokio::{sync::RwLock, time::Instant};

use crate::models::question::QuestionPayload;

#[derive(Debug, Clone)]
struct CachedPayload {
    payload: QuestionPayload,
    stored_at: Instant,
}

/// Single-slot, process-lifetime cache of the last validated payload.
///
/// Payload and timestamp are replaced together. A stale entry stays in the
/// slot and can still be served by `any`.
#[derive(Debug)]
pub struct PayloadCache {
    ttl: Duration,
    slot: RwLock<Option<CachedPayload>>,
}

impl PayloadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The cached payload if it was stored less than `ttl` ago.
    pub async fn fresh(&self) -> Option<QuestionPayload> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone())
    }

    /// The cached payload regardless of age.
    pub async fn any(&self) -> Option<QuestionPayload> {
        self.slot.read().await.as_ref().map(|entry| entry.payload.clone())
    }

    pub async fn store(&self, payload: QuestionPayload) {
        *self.slot.write().await = Some(CachedPayload {
            payload,
            stored_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(marker: &str) -> QuestionPayload {
        QuestionPayload {
            generated_by: marker.to_string(),
            subjects: vec![],
        }
    }

    #[tokio::test]
    async fn empty_cache_has_nothing() {
        let cache = PayloadCache::new(Duration::from_secs(600));
        assert!(cache.fresh().await.is_none());
        assert!(cache.any().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_goes_stale_but_stays_available() {
        let cache = PayloadCache::new(Duration::from_secs(600));
        cache.store(payload("a")).await;

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.fresh().await, Some(payload("a")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.fresh().await.is_none());
        assert_eq!(cache.any().await, Some(payload("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn store_overwrites_and_restarts_ttl() {
        let cache = PayloadCache::new(Duration::from_secs(600));
        cache.store(payload("a")).await;
        tokio::time::advance(Duration::from_secs(700)).await;

        cache.store(payload("b")).await;
        assert_eq!(cache.fresh().await, Some(payload("b")));
    }
}
