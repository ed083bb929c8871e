//! Rebuilds `Key -> {deviceIds}` and `deviceId -> {Keys}` from the current
//! subscription set.

use std::collections::{HashMap, HashSet};

use arrival_core::key::Key;
use arrival_core::subscription::{DeviceOptions, Subscription};
use smol_str::SmolStr;
use tracing::warn;

use crate::registry::ProviderRegistry;

/// `Key -> set<deviceId>`.
pub type FanoutMap = HashMap<Key, HashSet<SmolStr>>;
/// `deviceId -> set<Key>`.
pub type ReverseFanout = HashMap<SmolStr, HashSet<Key>>;
/// `deviceId -> DeviceOptions`, first-occurrence-wins across subscriptions.
pub type DeviceOptionsMap = HashMap<SmolStr, DeviceOptions>;

/// The three maps produced by a single fanout rebuild, always replaced as
/// a unit so readers observe either the old or the new snapshot.
#[derive(Debug, Default, Clone)]
pub struct FanoutSnapshot {
    /// `Key -> set<deviceId>`.
    pub fanout: FanoutMap,
    /// `deviceId -> set<Key>`.
    pub reverse: ReverseFanout,
    /// `deviceId -> DeviceOptions`, first occurrence wins.
    pub device_options: DeviceOptionsMap,
}

/// Rebuilds the fanout maps from a subscription snapshot and the current
/// provider registry.
///
/// Subscriptions whose provider is unregistered, or whose provider does not
/// support the subscription's type, are dropped with a `warn` log. An empty
/// subscription set produces an empty (but valid) snapshot.
pub fn build_fanout(subscriptions: &[Subscription], registry: &ProviderRegistry) -> FanoutSnapshot {
    let mut fanout = FanoutMap::new();
    let mut reverse = ReverseFanout::new();
    let mut device_options = DeviceOptionsMap::new();

    for sub in subscriptions {
        let Some(provider) = registry.get(&sub.provider_id) else {
            warn!(
                provider_id = %sub.provider_id,
                device_id = %sub.device_id,
                "dropping subscription: unknown provider"
            );
            continue;
        };

        if !provider.supports(&sub.r#type) {
            warn!(
                provider_id = %sub.provider_id,
                type_ = %sub.r#type,
                device_id = %sub.device_id,
                "dropping subscription: unsupported type"
            );
            continue;
        }

        let key = provider.to_key(&sub.r#type, &sub.config);

        fanout.entry(key.clone()).or_default().insert(sub.device_id.clone());
        reverse
            .entry(sub.device_id.clone())
            .or_default()
            .insert(key);

        // First occurrence wins: only insert if this device has no options yet.
        device_options
            .entry(sub.device_id.clone())
            .or_insert_with(|| DeviceOptions::from(sub));
    }

    FanoutSnapshot {
        fanout,
        reverse,
        device_options,
    }
}
