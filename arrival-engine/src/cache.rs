//! The typed arrival cache layered over a [`SideStore`].

use std::sync::Arc;

use arrival_core::cache::{CacheEntry, EXPIRE_PLACEHOLDER_TTL_SECONDS};
use arrival_core::error::EngineError;
use arrival_core::key::Key;
use arrival_core::side_store::{PREFIX_ARRIVALS_CACHE, SideStore};

fn storage_key(key: &Key) -> String {
    format!("{PREFIX_ARRIVALS_CACHE}{}", key.as_str())
}

fn decode(bytes: &[u8]) -> Result<CacheEntry, EngineError> {
    serde_json::from_slice(bytes).map_err(|e| EngineError::CacheStoreError(Box::new(e)))
}

fn encode(entry: &CacheEntry) -> Result<Vec<u8>, EngineError> {
    serde_json::to_vec(entry).map_err(|e| EngineError::CacheStoreError(Box::new(e)))
}

/// `Key -> CacheEntry` mapping with TTL semantics and an "expire now"
/// operation, backed by an injected [`SideStore`].
pub struct ArrivalCache {
    store: Arc<dyn SideStore>,
}

impl ArrivalCache {
    /// Wraps a [`SideStore`] as an arrival cache.
    pub fn new(store: Arc<dyn SideStore>) -> Self {
        ArrivalCache { store }
    }

    /// Reads the entry for `key`, hiding it if expired as of `now_ms`.
    ///
    /// This is what subscription-facing reads (the composer) should call:
    /// an expired entry looks exactly like a miss.
    pub async fn get(&self, key: &Key, now_ms: i64) -> Result<Option<CacheEntry>, EngineError> {
        Ok(self
            .get_raw(key)
            .await?
            .filter(|entry| !entry.is_expired(now_ms)))
    }

    /// Reads the entry for `key` regardless of expiry.
    ///
    /// The scheduler uses this to tell "entry present but expired" apart
    /// from "no entry at all" for logging, then makes its own expiry
    /// decision against the current tick's `now_ms`.
    pub async fn get_raw(&self, key: &Key) -> Result<Option<CacheEntry>, EngineError> {
        match self.store.get(&storage_key(key)).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a fresh entry for `key`. `ttl_seconds` is floored and clamped
    /// to at least [`MIN_TTL_SECONDS`](arrival_core::cache::MIN_TTL_SECONDS).
    pub async fn set(
        &self,
        key: &Key,
        payload: serde_json::Value,
        ttl_seconds: u64,
        now_ms: i64,
    ) -> Result<CacheEntry, EngineError> {
        let entry = CacheEntry::fresh(payload, ttl_seconds, now_ms);
        self.store
            .set(&storage_key(key), encode(&entry)?, ttl_seconds.max(1))
            .await?;
        Ok(entry)
    }

    /// Forces `key` to be expired as of `now_ms`.
    ///
    /// If an entry exists, its `expiresAt` is set to `now_ms`. If none
    /// exists, a placeholder `{payload: null, fetchedAt: now, expiresAt:
    /// now}` is inserted with a residual TTL of at least
    /// [`EXPIRE_PLACEHOLDER_TTL_SECONDS`] so a subsequent `get_raw` sees
    /// "expired entry exists" rather than absence until the scheduler's
    /// next tick picks it up. Repeated calls are idempotent beyond the
    /// first: the entry is already expired, so re-expiring it is a no-op
    /// in effect.
    pub async fn mark_expired(&self, key: &Key, now_ms: i64) -> Result<(), EngineError> {
        let entry = match self.get_raw(key).await? {
            Some(existing) => existing.expire_at(now_ms),
            None => CacheEntry::expired_placeholder(now_ms),
        };
        self.store
            .set(
                &storage_key(key),
                encode(&entry)?,
                EXPIRE_PLACEHOLDER_TTL_SECONDS,
            )
            .await?;
        Ok(())
    }

    /// Iterates all entries currently stored (expired or fresh).
    pub async fn scan_entries(&self) -> Result<Vec<(Key, CacheEntry)>, EngineError> {
        let keys = self.store.scan(PREFIX_ARRIVALS_CACHE).await?;
        let mut out = Vec::with_capacity(keys.len());
        for storage_key in keys {
            let Some(raw_key) = storage_key.strip_prefix(PREFIX_ARRIVALS_CACHE) else {
                continue;
            };
            if let Some(bytes) = self.store.get(&storage_key).await? {
                out.push((Key::from_canonical(raw_key.to_string()), decode(&bytes)?));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemorySideStore;
    use arrival_core::key::build_key;
    use serde_json::json;

    fn cache() -> ArrivalCache {
        ArrivalCache::new(Arc::new(InMemorySideStore::new()))
    }

    #[tokio::test]
    async fn set_computes_expiry_from_floored_clamped_ttl() {
        let cache = cache();
        let key = build_key("p", "t", [("stop", "S")]);
        let entry = cache.set(&key, json!({"a": 1}), 15, 1_000).await.unwrap();
        assert_eq!(entry.expires_at, 1_000 + 15_000);

        // TTL of zero is clamped to the 1-second minimum.
        let entry = cache.set(&key, json!({"a": 1}), 0, 1_000).await.unwrap();
        assert_eq!(entry.expires_at, 1_000 + 1_000);
    }

    #[tokio::test]
    async fn get_hides_expired_entries_but_get_raw_does_not() {
        let cache = cache();
        let key = build_key("p", "t", [("stop", "S")]);
        cache.set(&key, json!({"a": 1}), 1, 0).await.unwrap();

        assert!(cache.get(&key, 500).await.unwrap().is_some());
        assert!(cache.get(&key, 5_000).await.unwrap().is_none());
        assert!(cache.get_raw(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_expired_on_absent_key_creates_placeholder() {
        let cache = cache();
        let key = build_key("p", "t", [("stop", "S")]);
        cache.mark_expired(&key, 1_000).await.unwrap();

        let entry = cache.get_raw(&key).await.unwrap().unwrap();
        assert!(entry.payload.is_none());
        assert_eq!(entry.fetched_at, 1_000);
        assert_eq!(entry.expires_at, 1_000);
    }

    #[tokio::test]
    async fn mark_expired_is_idempotent_beyond_first_call() {
        let cache = cache();
        let key = build_key("p", "t", [("stop", "S")]);
        cache.set(&key, json!({"a": 1}), 60, 0).await.unwrap();

        cache.mark_expired(&key, 1_000).await.unwrap();
        let first = cache.get_raw(&key).await.unwrap().unwrap();
        assert!(first.is_expired(1_000));

        cache.mark_expired(&key, 2_000).await.unwrap();
        let second = cache.get_raw(&key).await.unwrap().unwrap();
        assert!(second.is_expired(1_000));
        assert!(second.is_expired(2_000));
    }

    #[tokio::test]
    async fn scan_entries_lists_everything_stored() {
        let cache = cache();
        let key_a = build_key("p", "t", [("stop", "A")]);
        let key_b = build_key("p", "t", [("stop", "B")]);
        cache.set(&key_a, json!(1), 60, 0).await.unwrap();
        cache.set(&key_b, json!(2), 60, 0).await.unwrap();

        let mut entries = cache.scan_entries().await.unwrap();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        assert_eq!(entries.len(), 2);
    }
}
