//! The single-flight fetcher: ensures at most one concurrent
//! `provider.fetch` call per [`Key`].

use std::sync::Arc;

use arrival_core::error::EngineError;
use arrival_core::key::Key;
use arrival_core::metrics::{Timer, record_fetch, set_inflight};
use arrival_core::provider::FetchContext;
use arrival_core::side_store::SideStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::cache::ArrivalCache;
use crate::registry::ProviderRegistry;

/// Invoked exactly once per key, after a successful fetch has been written
/// to the cache, so the caller can compose and publish device commands to
/// that key's currently active subscribers.
///
/// Concurrent callers of [`SingleFlightFetcher::fetch_key`] for the same
/// key share one fetch; only the caller that actually ran `provider.fetch`
/// invokes this hook, exactly once.
#[async_trait]
pub trait FetchCompletionHandler: Send + Sync {
    /// Called after `key`'s cache entry has been refreshed.
    async fn on_fetch_success(&self, key: &Key);
}

/// Ensures at most one fetch per [`Key`] is in flight; concurrent callers
/// for the same key await the same in-progress attempt rather than issuing
/// their own `provider.fetch` call.
pub struct SingleFlightFetcher {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ArrivalCache>,
    provider_kv: Arc<dyn SideStore>,
    completion: Arc<dyn FetchCompletionHandler>,
    inflight: DashMap<Key, broadcast::Sender<()>>,
}

impl SingleFlightFetcher {
    /// Builds a fetcher over the given registry, cache, provider-scoped KV
    /// store, and success-completion hook.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ArrivalCache>,
        provider_kv: Arc<dyn SideStore>,
        completion: Arc<dyn FetchCompletionHandler>,
    ) -> Self {
        SingleFlightFetcher {
            registry,
            cache,
            provider_kv,
            completion,
            inflight: DashMap::new(),
        }
    }

    /// Number of keys with a fetch currently in flight.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Fetches `key`, coalescing concurrent callers into a single upstream
    /// call. Never propagates a provider failure: on failure this logs and
    /// counts the error and returns `Ok(())`, leaving the cache entry as it
    /// was so the next scheduler tick retries.
    pub async fn fetch_key(&self, key: &Key, now_ms: i64) -> Result<(), EngineError> {
        let (tx, is_leader) = {
            match self.inflight.entry(key.clone()) {
                Entry::Occupied(entry) => (entry.get().clone(), false),
                Entry::Vacant(entry) => {
                    let (tx, _rx) = broadcast::channel(1);
                    entry.insert(tx.clone());
                    (tx, true)
                }
            }
        };

        if !is_leader {
            let mut rx = tx.subscribe();
            let _ = rx.recv().await;
            return Ok(());
        }

        set_inflight(self.inflight.len());
        self.run_leader_fetch(key, now_ms).await;
        self.inflight.remove(key);
        set_inflight(self.inflight.len());
        let _ = tx.send(());
        Ok(())
    }

    async fn run_leader_fetch(&self, key: &Key, now_ms: i64) {
        let parsed = match arrival_core::key::parse_key(key) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(key = %key, error = %err, "fetcher: malformed key, dropping");
                return;
            }
        };

        let Some(provider) = self.registry.get(&parsed.provider_id) else {
            warn!(key = %key, provider_id = %parsed.provider_id, "fetcher: no provider registered, skipping");
            return;
        };

        let ctx = FetchContext {
            now_ms,
            key: key.clone(),
            provider_kv: self.provider_kv.clone(),
        };

        let timer = Timer::new();
        let result = provider.fetch(&ctx).await;
        let success = result.is_ok();
        record_fetch(provider.provider_id(), timer, success);

        match result {
            Ok(outcome) => {
                if let Err(err) = self.cache.set(key, outcome.payload, outcome.ttl_seconds, now_ms).await {
                    error!(key = %key, error = %err, "fetcher: cache write failed after successful fetch");
                    return;
                }
                self.completion.on_fetch_success(key).await;
            }
            Err(err) => {
                error!(
                    key = %key,
                    provider_id = %parsed.provider_id,
                    error = %err,
                    "fetcher: provider fetch failed, will retry next tick"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemorySideStore;
    use arrival_core::key::build_key;
    use arrival_test::FakeProvider;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingCompletion {
        count: AtomicUsize,
    }

    impl CountingCompletion {
        fn new() -> Self {
            CountingCompletion {
                count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FetchCompletionHandler for CountingCompletion {
        async fn on_fetch_success(&self, _key: &Key) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(provider: FakeProvider) -> (Arc<SingleFlightFetcher>, Arc<ArrivalCache>, Arc<CountingCompletion>) {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(provider));
        let cache = Arc::new(ArrivalCache::new(Arc::new(InMemorySideStore::new())));
        let completion = Arc::new(CountingCompletion::new());
        let fetcher = Arc::new(SingleFlightFetcher::new(
            registry,
            cache.clone(),
            Arc::new(InMemorySideStore::new()),
            completion.clone(),
        ));
        (fetcher, cache, completion)
    }

    #[tokio::test]
    async fn successful_fetch_writes_cache_and_fires_completion() {
        let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"ok": true}), 15);
        let (fetcher, cache, completion) = setup(provider);
        let key = build_key("p", "arrivals", [("stop", "S")]);

        fetcher.fetch_key(&key, 1_000).await.unwrap();

        assert!(cache.get(&key, 1_000).await.unwrap().is_some());
        assert_eq!(completion.count.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.inflight_count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_empty_and_skips_completion() {
        let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_err();
        let (fetcher, cache, completion) = setup(provider);
        let key = build_key("p", "arrivals", [("stop", "S")]);

        fetcher.fetch_key(&key, 1_000).await.unwrap();

        assert!(cache.get(&key, 1_000).await.unwrap().is_none());
        assert_eq!(completion.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_provider_is_a_no_op() {
        let registry = Arc::new(ProviderRegistry::new());
        let cache = Arc::new(ArrivalCache::new(Arc::new(InMemorySideStore::new())));
        let completion = Arc::new(CountingCompletion::new());
        let fetcher = SingleFlightFetcher::new(
            registry,
            cache.clone(),
            Arc::new(InMemorySideStore::new()),
            completion.clone(),
        );
        let key = build_key("ghost", "arrivals", [("stop", "S")]);

        fetcher.fetch_key(&key, 1_000).await.unwrap();

        assert!(cache.get(&key, 1_000).await.unwrap().is_none());
        assert_eq!(completion.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_fetches_for_same_key_call_provider_once() {
        let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"ok": true}), 15);
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(provider));
        let cache = Arc::new(ArrivalCache::new(Arc::new(InMemorySideStore::new())));
        let completion = Arc::new(CountingCompletion::new());
        let fetcher = Arc::new(SingleFlightFetcher::new(
            registry,
            cache.clone(),
            Arc::new(InMemorySideStore::new()),
            completion.clone(),
        ));
        let key = build_key("p", "arrivals", [("stop", "S")]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let fetcher = fetcher.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { fetcher.fetch_key(&key, 1_000).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(completion.count.load(Ordering::SeqCst), 1);
    }
}
