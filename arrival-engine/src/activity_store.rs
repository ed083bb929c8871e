//! The device activity store: presence + heartbeat tracking, and the
//! derived activity status gate.

use std::collections::HashSet;
use std::sync::Arc;

use arrival_core::activity::{DeviceActivity, DeviceActivityRecord, Presence, derive_status};
use arrival_core::error::EngineError;
use arrival_core::side_store::{SideStore, device_last_seen_key, device_presence_key};
use smol_str::SmolStr;

fn encode_presence(presence: Presence) -> Vec<u8> {
    match presence {
        Presence::Online => b"online".to_vec(),
        Presence::Offline => b"offline".to_vec(),
        Presence::Unknown => b"unknown".to_vec(),
    }
}

fn decode_presence(bytes: &[u8]) -> Presence {
    match bytes {
        b"online" => Presence::Online,
        b"offline" => Presence::Offline,
        _ => Presence::Unknown,
    }
}

/// `deviceId -> {presence, lastSeenMs}`, with derived `active|inactive|
/// stale|unknown` status used to gate fetches and pushes.
pub struct DeviceActivityStore {
    store: Arc<dyn SideStore>,
    heartbeat_timeout_ms: i64,
}

impl DeviceActivityStore {
    /// Wraps a [`SideStore`] as a device activity store.
    pub fn new(store: Arc<dyn SideStore>, heartbeat_timeout_ms: i64) -> Self {
        DeviceActivityStore {
            store,
            heartbeat_timeout_ms,
        }
    }

    /// Sets presence to online, without touching the heartbeat timestamp.
    pub async fn mark_active(&self, device_id: &str) -> Result<(), EngineError> {
        self.store
            .set(&device_presence_key(device_id), encode_presence(Presence::Online), 0)
            .await
    }

    /// Sets presence to offline.
    pub async fn mark_inactive(&self, device_id: &str) -> Result<(), EngineError> {
        self.store
            .set(&device_presence_key(device_id), encode_presence(Presence::Offline), 0)
            .await
    }

    /// Records a heartbeat: presence becomes online and `lastSeenMs` is
    /// updated to `now_ms`.
    pub async fn record_heartbeat(&self, device_id: &str, now_ms: i64) -> Result<(), EngineError> {
        self.store
            .set(&device_presence_key(device_id), encode_presence(Presence::Online), 0)
            .await?;
        self.store
            .set(
                &device_last_seen_key(device_id),
                now_ms.to_string().into_bytes(),
                0,
            )
            .await
    }

    async fn load_record(&self, device_id: &str) -> Result<DeviceActivityRecord, EngineError> {
        let presence = self
            .store
            .get(&device_presence_key(device_id))
            .await?
            .map(|bytes| decode_presence(&bytes))
            .unwrap_or_default();
        let last_seen_ms = self
            .store
            .get(&device_last_seen_key(device_id))
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| s.parse::<i64>().ok());
        Ok(DeviceActivityRecord {
            presence,
            last_seen_ms,
        })
    }

    /// Derives a device's current [`DeviceActivity`] as of `now_ms`.
    pub async fn snapshot(&self, device_id: &str, now_ms: i64) -> Result<DeviceActivity, EngineError> {
        let record = self.load_record(device_id).await?;
        Ok(derive_status(
            SmolStr::new(device_id),
            record,
            self.heartbeat_timeout_ms,
            now_ms,
        ))
    }

    /// Derives activity for a batch of devices, for fanout gating.
    pub async fn snapshot_many(
        &self,
        device_ids: &[SmolStr],
        now_ms: i64,
    ) -> Result<Vec<DeviceActivity>, EngineError> {
        let mut out = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            out.push(self.snapshot(device_id, now_ms).await?);
        }
        Ok(out)
    }

    /// Returns the subset of `device_ids` whose derived status is
    /// [`ActivityStatus::Active`](arrival_core::activity::ActivityStatus::Active).
    ///
    /// Per the design's open-question resolution, `stale` devices are not
    /// considered eligible for fetch-triggering or pushes.
    pub async fn active_ids(
        &self,
        device_ids: &[SmolStr],
        now_ms: i64,
    ) -> Result<HashSet<SmolStr>, EngineError> {
        let mut out = HashSet::new();
        for activity in self.snapshot_many(device_ids, now_ms).await? {
            if matches!(activity.status, arrival_core::activity::ActivityStatus::Active) {
                out.insert(activity.device_id);
            }
        }
        Ok(out)
    }
}
