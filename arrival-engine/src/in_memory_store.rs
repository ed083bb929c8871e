//! A `DashMap`-backed [`SideStore`] for single-process deployments and
//! tests.

use arrival_core::error::EngineError;
use arrival_core::side_store::SideStore;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::clock::now_ms;

struct Entry {
    value: Vec<u8>,
    /// Epoch milliseconds after which this entry is no longer readable.
    /// `None` means "never expires".
    expires_at_ms: Option<i64>,
}

/// In-memory [`SideStore`] implementation.
///
/// Expiry is checked lazily on read (no background sweeper), matching the
/// cache's own "never returns an entry whose `expiresAt <= now`" contract —
/// a read past expiry acts exactly like a miss, a la `hitbox-moka`'s
/// best-effort eviction, but deterministic rather than eviction-driven.
#[derive(Default)]
pub struct InMemorySideStore {
    entries: DashMap<String, Entry>,
}

impl InMemorySideStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemorySideStore {
            entries: DashMap::new(),
        }
    }

    /// Number of entries currently stored, including ones that have
    /// expired but not yet been read (and thus swept).
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl SideStore for InMemorySideStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let now = now_ms();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at_ms.is_none_or(|exp| exp > now) => {
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                drop(self.entries.remove(key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), EngineError> {
        let expires_at_ms = if ttl_seconds == 0 {
            None
        } else {
            Some(now_ms() + (ttl_seconds as i64) * 1000)
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), EngineError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        let now = now_ms();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .filter(|e| e.value().expires_at_ms.is_none_or(|exp| exp > now))
            .map(|e| e.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_value() {
        let store = InMemorySideStore::new();
        store.set("k", b"v".to_vec(), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let store = InMemorySideStore::new();
        store.set("k", b"v".to_vec(), 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let store = InMemorySideStore::new();
        store.set("k", b"v".to_vec(), 60).await.unwrap();
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_filters_by_prefix() {
        let store = InMemorySideStore::new();
        store.set("a:1", b"v".to_vec(), 60).await.unwrap();
        store.set("b:1", b"v".to_vec(), 60).await.unwrap();
        let mut keys = store.scan("a:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a:1".to_string()]);
    }
}
