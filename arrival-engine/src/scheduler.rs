//! The two periodic loops: refresh (fetch expired keys with active
//! subscribers) and push (send a fresh device command to every active
//! device).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrival_core::metrics::{record_cache_lookup, set_inflight};
use smol_str::SmolStr;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::activity_store::DeviceActivityStore;
use crate::cache::ArrivalCache;
use crate::composer::DeviceCommandComposer;
use crate::fanout::FanoutSnapshot;
use crate::fetcher::SingleFlightFetcher;

/// A tick that arrives while the previous tick's body is still running is
/// dropped rather than queued — this is the scheduler's entire
/// backpressure story.
pub struct ReentrancyGuard {
    running: AtomicBool,
}

impl ReentrancyGuard {
    /// Creates a guard in the "not running" state.
    pub fn new() -> Self {
        ReentrancyGuard {
            running: AtomicBool::new(false),
        }
    }

    /// Attempts to enter the guarded body. Returns `false` (and does
    /// nothing else) if a previous call is still inside.
    pub fn try_enter(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks the guarded body as finished.
    pub fn leave(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one refresh-loop tick: for every `(key, devices)` pair in the
/// current fanout snapshot with at least one active device, fetch the key
/// if its cache entry is missing or expired.
///
/// Individual fetches are fire-and-forget `tokio::spawn`s collected into a
/// `JoinSet` so callers (notably `stop()`) can await their completion
/// without blocking the next tick's scheduling decision.
pub async fn run_refresh_tick(
    fanout: &FanoutSnapshot,
    activity: &DeviceActivityStore,
    cache: &ArrivalCache,
    fetcher: &Arc<SingleFlightFetcher>,
    now_ms: i64,
) -> JoinSet<()> {
    let all_device_ids: Vec<SmolStr> = fanout.reverse.keys().cloned().collect();
    let active = match activity.active_ids(&all_device_ids, now_ms).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "scheduler: failed to snapshot device activity, skipping tick");
            HashSet::new()
        }
    };

    let mut joins = JoinSet::new();
    for (key, devices) in &fanout.fanout {
        if !devices.iter().any(|d| active.contains(d)) {
            continue;
        }

        let needs_fetch = match cache.get_raw(key).await {
            Ok(Some(entry)) => {
                let expired = entry.is_expired(now_ms);
                record_cache_lookup(!expired);
                expired
            }
            Ok(None) => {
                record_cache_lookup(false);
                true
            }
            Err(err) => {
                warn!(key = %key, error = %err, "scheduler: cache read failed, treating as miss");
                true
            }
        };

        if needs_fetch {
            let fetcher = fetcher.clone();
            let key = key.clone();
            joins.spawn(async move {
                if let Err(err) = fetcher.fetch_key(&key, now_ms).await {
                    warn!(key = %key, error = %err, "scheduler: fetch_key returned an error");
                }
            });
        }
    }

    set_inflight(fetcher.inflight_count());
    joins
}

/// Runs one push-loop tick: composes and publishes a device command for
/// every currently active device.
pub async fn run_push_tick(
    fanout: &FanoutSnapshot,
    activity: &DeviceActivityStore,
    composer: &DeviceCommandComposer,
    now_ms: i64,
) {
    let all_device_ids: Vec<SmolStr> = fanout.reverse.keys().cloned().collect();
    let active = match activity.active_ids(&all_device_ids, now_ms).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "scheduler: failed to snapshot device activity, skipping push tick");
            return;
        }
    };

    for device_id in &active {
        if let Err(err) = composer.compose_and_publish(device_id, fanout, now_ms).await {
            warn!(device_id = %device_id, error = %err, "scheduler: push failed for device");
        } else {
            debug!(device_id = %device_id, "scheduler: pushed device command");
        }
    }
}
