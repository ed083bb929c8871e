//! The device subscription data model.

use std::collections::BTreeMap;

use smol_str::SmolStr;

/// Default `displayType` when a subscription does not set one.
pub const DEFAULT_DISPLAY_TYPE: u32 = 1;

/// Default `arrivalsToDisplay` when a subscription does not set one.
pub const DEFAULT_ARRIVALS_TO_DISPLAY: u8 = 1;

/// Clamp bounds for `arrivalsToDisplay`.
pub const ARRIVALS_TO_DISPLAY_RANGE: std::ops::RangeInclusive<u8> = 1..=3;

/// One device's request for updates about a `(providerId, type)` feed.
///
/// Subscriptions are immutable within a single fanout-rebuild cycle; a new
/// snapshot is loaded wholesale via
/// [`loadSubscriptions`](crate::provider::LoadSubscriptions).
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Subscription {
    /// The device this subscription belongs to.
    pub device_id: SmolStr,
    /// The provider that should serve this subscription.
    pub provider_id: SmolStr,
    /// Provider-defined subscription type (e.g. `"arrivals"`).
    pub r#type: SmolStr,
    /// Provider-specific configuration (stop id, line, direction, ...).
    pub config: BTreeMap<String, String>,
    /// Device display mode. Defaults to [`DEFAULT_DISPLAY_TYPE`].
    #[serde(default)]
    pub display_type: Option<u32>,
    /// Whether the device should scroll between lines. Defaults to `false`.
    #[serde(default)]
    pub scrolling: Option<bool>,
    /// How many arrivals per line to render. Clamped to `[1, 3]`, defaults
    /// to [`DEFAULT_ARRIVALS_TO_DISPLAY`].
    #[serde(default)]
    pub arrivals_to_display: Option<u8>,
}

/// Per-device rendering options, derived from the first subscription a
/// device has for any key (stable-ordering "first occurrence wins").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DeviceOptions {
    /// Device display mode.
    pub display_type: u32,
    /// Whether the device should scroll between lines.
    pub scrolling: bool,
    /// How many arrivals per line to render, clamped to `[1, 3]`.
    pub arrivals_to_display: u8,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            display_type: DEFAULT_DISPLAY_TYPE,
            scrolling: false,
            arrivals_to_display: DEFAULT_ARRIVALS_TO_DISPLAY,
        }
    }
}

impl From<&Subscription> for DeviceOptions {
    fn from(sub: &Subscription) -> Self {
        let arrivals_to_display = sub
            .arrivals_to_display
            .unwrap_or(DEFAULT_ARRIVALS_TO_DISPLAY)
            .clamp(*ARRIVALS_TO_DISPLAY_RANGE.start(), *ARRIVALS_TO_DISPLAY_RANGE.end());
        DeviceOptions {
            display_type: sub.display_type.unwrap_or(DEFAULT_DISPLAY_TYPE),
            scrolling: sub.scrolling.unwrap_or(false),
            arrivals_to_display,
        }
    }
}
