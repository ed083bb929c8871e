//! The public facade: wires the registry, cache, activity store, fanout,
//! fetcher and composer together and drives the two scheduler loops.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use arrival_core::error::EngineError;
use arrival_core::key::Key;
use arrival_core::provider::LoadSubscriptions;
use arrival_core::publisher::Publisher;
use arrival_core::side_store::SideStore;
use async_trait::async_trait;
use smol_str::SmolStr;
use tokio::sync::OnceCell;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use crate::activity_store::DeviceActivityStore;
use crate::cache::ArrivalCache;
use crate::clock::now_ms;
use crate::composer::DeviceCommandComposer;
use crate::config::EngineConfig;
use crate::fanout::{FanoutSnapshot, build_fanout};
use crate::fetcher::{FetchCompletionHandler, SingleFlightFetcher};
use crate::in_memory_store::InMemorySideStore;
use crate::labels::{DirectionLabelResolver, NoopLabelResolver, StopLabelResolver};
use crate::registry::ProviderRegistry;
use crate::scheduler::{ReentrancyGuard, run_push_tick, run_refresh_tick};

/// Builds an [`Engine`]. `registry`, `config`, `load_subscriptions`, and
/// `publisher` are supplied up front; side stores and label resolvers fall
/// back to in-process/no-op defaults when not overridden.
pub struct EngineBuilder {
    registry: Arc<ProviderRegistry>,
    config: EngineConfig,
    load_subscriptions: Arc<dyn LoadSubscriptions>,
    publisher: Arc<dyn Publisher>,
    cache_store: Arc<dyn SideStore>,
    activity_store: Arc<dyn SideStore>,
    provider_kv: Arc<dyn SideStore>,
    stop_labels: Arc<dyn StopLabelResolver>,
    direction_labels: Arc<dyn DirectionLabelResolver>,
}

impl EngineBuilder {
    /// Starts a builder over the given subscription source, publish sink,
    /// provider registry, and engine config. Side stores default to
    /// independent in-process maps; label resolvers default to no-ops.
    pub fn new(
        load_subscriptions: Arc<dyn LoadSubscriptions>,
        publisher: Arc<dyn Publisher>,
        registry: Arc<ProviderRegistry>,
        config: EngineConfig,
    ) -> Self {
        EngineBuilder {
            registry,
            config,
            load_subscriptions,
            publisher,
            cache_store: Arc::new(InMemorySideStore::new()),
            activity_store: Arc::new(InMemorySideStore::new()),
            provider_kv: Arc::new(InMemorySideStore::new()),
            stop_labels: Arc::new(NoopLabelResolver),
            direction_labels: Arc::new(NoopLabelResolver),
        }
    }

    /// Overrides the side-store backing the arrival cache.
    pub fn cache_store(mut self, store: Arc<dyn SideStore>) -> Self {
        self.cache_store = store;
        self
    }

    /// Overrides the side-store backing the device activity store.
    pub fn activity_store(mut self, store: Arc<dyn SideStore>) -> Self {
        self.activity_store = store;
        self
    }

    /// Overrides the side-store used for provider-scoped key-value state.
    pub fn provider_kv(mut self, store: Arc<dyn SideStore>) -> Self {
        self.provider_kv = store;
        self
    }

    /// Overrides the stop-name label resolver (defaults to a no-op).
    pub fn stop_label_resolver(mut self, resolver: Arc<dyn StopLabelResolver>) -> Self {
        self.stop_labels = resolver;
        self
    }

    /// Overrides the direction-label resolver (defaults to a no-op).
    pub fn direction_label_resolver(mut self, resolver: Arc<dyn DirectionLabelResolver>) -> Self {
        self.direction_labels = resolver;
        self
    }

    /// Builds the engine. Does not start the scheduler loops — call
    /// [`Engine::start`] for that.
    pub fn build(self) -> Arc<Engine> {
        let cache = Arc::new(ArrivalCache::new(self.cache_store));
        let activity = Arc::new(DeviceActivityStore::new(
            self.activity_store,
            self.config.heartbeat_timeout_ms,
        ));
        let composer = Arc::new(DeviceCommandComposer::new(
            cache.clone(),
            self.publisher,
            self.stop_labels,
            self.direction_labels,
        ));

        Arc::new_cyclic(|weak: &std::sync::Weak<Engine>| {
            let completion = Arc::new(CompletionRelay {
                engine: weak.clone(),
            });
            let fetcher = Arc::new(SingleFlightFetcher::new(
                self.registry.clone(),
                cache.clone(),
                self.provider_kv,
                completion,
            ));

            Engine {
                registry: self.registry,
                cache,
                activity,
                fetcher,
                composer,
                load_subscriptions: self.load_subscriptions,
                fanout: ArcSwap::from_pointee(FanoutSnapshot::default()),
                config: self.config,
                ready: OnceCell::new(),
                loops: Mutex::new(None),
                refresh_joins: Mutex::new(Vec::new()),
            }
        })
    }
}

/// Forwards [`FetchCompletionHandler`] callbacks to the owning [`Engine`]
/// without the fetcher needing to hold a strong, cyclic reference to it.
struct CompletionRelay {
    engine: std::sync::Weak<Engine>,
}

#[async_trait]
impl FetchCompletionHandler for CompletionRelay {
    async fn on_fetch_success(&self, key: &Key) {
        if let Some(engine) = self.engine.upgrade() {
            engine.push_key_to_subscribers(key).await;
        }
    }
}

struct EngineLoops {
    refresh: JoinHandle<()>,
    push: JoinHandle<()>,
}

/// Drives the transit-arrival aggregator: rebuilds the device fanout on
/// subscription/activity changes, runs the refresh and push scheduler
/// loops, and exposes the synchronous-feeling admin operations
/// (`refreshKey`, `refreshDevice`, `reloadSubscriptions`,
/// `markDeviceActive`, `markDeviceInactive`).
pub struct Engine {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ArrivalCache>,
    activity: Arc<DeviceActivityStore>,
    fetcher: Arc<SingleFlightFetcher>,
    composer: Arc<DeviceCommandComposer>,
    load_subscriptions: Arc<dyn LoadSubscriptions>,
    fanout: ArcSwap<FanoutSnapshot>,
    config: EngineConfig,
    ready: OnceCell<()>,
    loops: Mutex<Option<EngineLoops>>,
    /// One `JoinSet` per refresh tick, retained so `stop()` can await every
    /// fetch it spawned without the scheduling decision itself waiting.
    refresh_joins: Mutex<Vec<JoinSet<()>>>,
}

impl Engine {
    /// Resolves after the initial fanout build and the first scheduler
    /// pass have completed. Safe to call repeatedly and from multiple
    /// tasks: only the first caller actually runs the bootstrap.
    pub async fn ready(&self) {
        let _ = self.ready.get_or_init(|| self.bootstrap()).await;
    }

    async fn bootstrap(&self) {
        self.reload_subscriptions_inner().await;
        let fanout = self.fanout.load_full();
        let now = now_ms();
        let mut joins = run_refresh_tick(&fanout, &self.activity, &self.cache, &self.fetcher, now).await;
        while joins.join_next().await.is_some() {}
        run_push_tick(&fanout, &self.activity, &self.composer, now).await;
        info!("engine: ready");
    }

    /// Spawns the refresh and push scheduler loops. `ready()` resolves as
    /// part of the first refresh-loop tick. Calling `start` twice replaces
    /// the previous loop handles without stopping them — callers should
    /// call [`Engine::stop`] first.
    pub fn start(self: &Arc<Self>) {
        let refresh = {
            let engine = self.clone();
            let guard = ReentrancyGuard::new();
            tokio::spawn(async move {
                engine.ready().await;
                let mut ticker = tokio::time::interval(Duration::from_millis(engine.config.refresh_interval_ms));
                loop {
                    ticker.tick().await;
                    if !guard.try_enter() {
                        continue;
                    }
                    let fanout = engine.fanout.load_full();
                    let now = now_ms();
                    let joins = run_refresh_tick(&fanout, &engine.activity, &engine.cache, &engine.fetcher, now).await;
                    engine.refresh_joins.lock().unwrap().push(joins);
                    guard.leave();
                }
            })
        };

        let push = {
            let engine = self.clone();
            let guard = ReentrancyGuard::new();
            tokio::spawn(async move {
                engine.ready().await;
                let mut ticker = tokio::time::interval(Duration::from_millis(engine.config.push_interval_ms));
                loop {
                    ticker.tick().await;
                    if !guard.try_enter() {
                        continue;
                    }
                    let fanout = engine.fanout.load_full();
                    let now = now_ms();
                    run_push_tick(&fanout, &engine.activity, &engine.composer, now).await;
                    guard.leave();
                }
            })
        };

        *self.loops.lock().unwrap() = Some(EngineLoops { refresh, push });
    }

    /// Cancels the two loop timers. In-flight fetches and pushes are not
    /// cancelled; they run to completion independently of the loop tasks.
    pub async fn stop(&self) {
        if let Some(loops) = self.loops.lock().unwrap().take() {
            loops.refresh.abort();
            loops.push.abort();
        }
        let pending = std::mem::take(&mut *self.refresh_joins.lock().unwrap());
        for mut joins in pending {
            while joins.join_next().await.is_some() {}
        }
    }

    /// Marks `key` expired, then (after `ready`) fetches it if any
    /// currently-fanned-out device subscribes to it.
    pub async fn refresh_key(&self, key: &Key) -> Result<(), EngineError> {
        self.cache.mark_expired(key, now_ms()).await?;
        self.ready().await;
        let fanout = self.fanout.load_full();
        if fanout.fanout.contains_key(key) {
            self.fetcher.fetch_key(key, now_ms()).await?;
        }
        Ok(())
    }

    /// Marks `device_id` active, then refreshes every key it subscribes to
    /// (expire, then fetch, all concurrently, awaited together).
    pub async fn refresh_device(&self, device_id: &str) -> Result<(), EngineError> {
        self.ready().await;
        self.activity.mark_active(device_id).await?;

        let fanout = self.fanout.load_full();
        let Some(keys) = fanout.reverse.get(device_id) else {
            return Err(EngineError::UnknownDevice(device_id.to_string()));
        };

        let now = now_ms();
        let mut joins = JoinSet::new();
        for key in keys {
            let cache = self.cache.clone();
            let fetcher = self.fetcher.clone();
            let key = key.clone();
            joins.spawn(async move {
                cache.mark_expired(&key, now).await?;
                fetcher.fetch_key(&key, now).await
            });
        }
        while let Some(result) = joins.join_next().await {
            result.map_err(|e| EngineError::CacheStoreError(Box::new(e)))??;
        }
        Ok(())
    }

    /// Calls the subscription source, rebuilds the fanout, then runs the
    /// refresh loop once against the new snapshot.
    pub async fn reload_subscriptions(&self) -> Result<(), EngineError> {
        self.reload_subscriptions_inner().await;
        let fanout = self.fanout.load_full();
        let now = now_ms();
        let mut joins = run_refresh_tick(&fanout, &self.activity, &self.cache, &self.fetcher, now).await;
        while joins.join_next().await.is_some() {}
        Ok(())
    }

    async fn reload_subscriptions_inner(&self) {
        match self.load_subscriptions.load_subscriptions().await {
            Ok(subscriptions) => {
                let snapshot = build_fanout(&subscriptions, &self.registry);
                self.fanout.store(Arc::new(snapshot));
            }
            Err(err) => {
                warn!(error = %err, "engine: loadSubscriptions failed, keeping previous fanout");
            }
        }
    }

    /// Sets `device_id` presence online and rebuilds the fanout, so the
    /// active-device filter used by both scheduler loops is current.
    pub async fn mark_device_active(&self, device_id: &str) -> Result<(), EngineError> {
        self.activity.mark_active(device_id).await?;
        self.reload_subscriptions_inner().await;
        Ok(())
    }

    /// Sets `device_id` presence offline and rebuilds the fanout.
    pub async fn mark_device_inactive(&self, device_id: &str) -> Result<(), EngineError> {
        self.activity.mark_inactive(device_id).await?;
        self.reload_subscriptions_inner().await;
        Ok(())
    }

    async fn push_key_to_subscribers(&self, key: &Key) {
        let fanout = self.fanout.load_full();
        let Some(devices) = fanout.fanout.get(key) else {
            return;
        };
        let all: Vec<SmolStr> = devices.iter().cloned().collect();
        let active = match self.activity.active_ids(&all, now_ms()).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(key = %key, error = %err, "engine: failed to snapshot activity for completion push");
                return;
            }
        };
        for device_id in active {
            if let Err(err) = self.composer.compose_and_publish(&device_id, &fanout, now_ms()).await {
                warn!(device_id = %device_id, error = %err, "engine: push-on-fetch-success failed");
            }
        }
    }
}
