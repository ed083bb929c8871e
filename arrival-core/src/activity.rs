//! Device presence/heartbeat model and the derived activity status.

use smol_str::SmolStr;

/// Default heartbeat timeout, in milliseconds.
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: i64 = 60_000;

/// Minimum allowed heartbeat timeout, in milliseconds.
pub const MIN_HEARTBEAT_TIMEOUT_MS: i64 = 15_000;

/// Maximum allowed heartbeat timeout, in milliseconds.
pub const MAX_HEARTBEAT_TIMEOUT_MS: i64 = 300_000;

/// Clamps a heartbeat timeout into `[MIN_HEARTBEAT_TIMEOUT_MS,
/// MAX_HEARTBEAT_TIMEOUT_MS]`.
pub fn clamp_heartbeat_timeout_ms(ms: i64) -> i64 {
    ms.clamp(MIN_HEARTBEAT_TIMEOUT_MS, MAX_HEARTBEAT_TIMEOUT_MS)
}

/// Self-reported device liveness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Presence {
    /// The device reported itself online.
    Online,
    /// The device reported itself offline.
    Offline,
    /// No presence signal has ever been recorded.
    #[default]
    Unknown,
}

/// Raw per-device liveness record, as stored in the activity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceActivityRecord {
    /// Last reported presence.
    pub presence: Presence,
    /// Epoch milliseconds of the last heartbeat, if any has been recorded.
    pub last_seen_ms: Option<i64>,
}

impl Default for DeviceActivityRecord {
    fn default() -> Self {
        DeviceActivityRecord {
            presence: Presence::Unknown,
            last_seen_ms: None,
        }
    }
}

/// Derived activity status, computed from a [`DeviceActivityRecord`] plus
/// the configured heartbeat timeout and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ActivityStatus {
    /// Heartbeat is recent — eligible for fetch-triggering and pushes.
    Active,
    /// Presence is online but the heartbeat is stale.
    Stale,
    /// Presence is offline, or unknown with a stale/absent heartbeat.
    Inactive,
    /// No signal at all has ever been received.
    Unknown,
}

/// Machine-readable reason behind a derived [`ActivityStatus`], mirroring
/// the decision table in the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ActivityReason {
    /// `lastSeenMs` present and within the heartbeat timeout.
    HeartbeatRecent,
    /// `presence == online`, heartbeat present but stale.
    HeartbeatTimeoutPresenceOnline,
    /// `presence == offline`, heartbeat present but stale.
    PresenceOffline,
    /// `presence == unknown`, heartbeat present but stale.
    HeartbeatTimeout,
    /// `presence == offline`, no heartbeat ever recorded.
    PresenceOfflineNoHeartbeat,
    /// `presence == online`, no heartbeat ever recorded.
    PresenceOnlineNoHeartbeat,
    /// `presence == unknown`, no heartbeat ever recorded.
    NoSignal,
}

/// A device's derived activity, as returned by
/// [`snapshot`](crate::activity::derive_status).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceActivity {
    /// The device this snapshot describes.
    pub device_id: SmolStr,
    /// Self-reported presence.
    pub presence: Presence,
    /// Epoch milliseconds of the last heartbeat, if any.
    pub last_seen_ms: Option<i64>,
    /// The heartbeat timeout used to derive `status`.
    pub heartbeat_timeout_ms: i64,
    /// Derived activity status.
    pub status: ActivityStatus,
    /// Machine-readable reason for the derived status.
    pub reason: ActivityReason,
}

/// Applies the presence/heartbeat decision table from the design to derive
/// a [`DeviceActivity`] snapshot.
pub fn derive_status(
    device_id: impl Into<SmolStr>,
    record: DeviceActivityRecord,
    heartbeat_timeout_ms: i64,
    now_ms: i64,
) -> DeviceActivity {
    let (status, reason) = match (record.presence, record.last_seen_ms) {
        (_, Some(last_seen)) if now_ms - last_seen <= heartbeat_timeout_ms => {
            (ActivityStatus::Active, ActivityReason::HeartbeatRecent)
        }
        (Presence::Online, Some(_)) => (
            ActivityStatus::Stale,
            ActivityReason::HeartbeatTimeoutPresenceOnline,
        ),
        (Presence::Offline, Some(_)) => {
            (ActivityStatus::Inactive, ActivityReason::PresenceOffline)
        }
        (Presence::Unknown, Some(_)) => {
            (ActivityStatus::Inactive, ActivityReason::HeartbeatTimeout)
        }
        (Presence::Offline, None) => (
            ActivityStatus::Inactive,
            ActivityReason::PresenceOfflineNoHeartbeat,
        ),
        (Presence::Online, None) => (
            ActivityStatus::Stale,
            ActivityReason::PresenceOnlineNoHeartbeat,
        ),
        (Presence::Unknown, None) => (ActivityStatus::Unknown, ActivityReason::NoSignal),
    };

    DeviceActivity {
        device_id: device_id.into(),
        presence: record.presence,
        last_seen_ms: record.last_seen_ms,
        heartbeat_timeout_ms,
        status,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(presence: Presence, last_seen_ms: Option<i64>) -> ActivityStatus {
        derive_status(
            "d1",
            DeviceActivityRecord {
                presence,
                last_seen_ms,
            },
            60_000,
            100_000,
        )
        .status
    }

    #[test]
    fn recent_heartbeat_is_active_regardless_of_presence() {
        assert_eq!(
            activity(Presence::Unknown, Some(50_000)),
            ActivityStatus::Active
        );
        assert_eq!(
            activity(Presence::Offline, Some(99_000)),
            ActivityStatus::Active
        );
    }

    #[test]
    fn stale_heartbeat_with_online_presence_is_stale() {
        assert_eq!(activity(Presence::Online, Some(0)), ActivityStatus::Stale);
    }

    #[test]
    fn stale_heartbeat_with_offline_presence_is_inactive() {
        assert_eq!(
            activity(Presence::Offline, Some(0)),
            ActivityStatus::Inactive
        );
    }

    #[test]
    fn no_heartbeat_offline_is_inactive() {
        assert_eq!(activity(Presence::Offline, None), ActivityStatus::Inactive);
    }

    #[test]
    fn no_heartbeat_online_is_stale() {
        assert_eq!(activity(Presence::Online, None), ActivityStatus::Stale);
    }

    #[test]
    fn no_signal_at_all_is_unknown() {
        assert_eq!(activity(Presence::Unknown, None), ActivityStatus::Unknown);
    }

    #[test]
    fn heartbeat_timeout_is_clamped() {
        assert_eq!(clamp_heartbeat_timeout_ms(1_000), MIN_HEARTBEAT_TIMEOUT_MS);
        assert_eq!(
            clamp_heartbeat_timeout_ms(10_000_000),
            MAX_HEARTBEAT_TIMEOUT_MS
        );
        assert_eq!(clamp_heartbeat_timeout_ms(20_000), 20_000);
    }
}
