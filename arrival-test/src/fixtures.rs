//! Small builders for constructing test subscriptions without repeating
//! every field.

use std::collections::BTreeMap;

use arrival_core::subscription::Subscription;
use smol_str::SmolStr;

/// Builds a minimal subscription with a single `config` entry.
pub fn subscription(device_id: &str, provider_id: &str, type_: &str, config: &[(&str, &str)]) -> Subscription {
    Subscription {
        device_id: SmolStr::new(device_id),
        provider_id: SmolStr::new(provider_id),
        r#type: SmolStr::new(type_),
        config: config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        display_type: None,
        scrolling: None,
        arrivals_to_display: None,
    }
}
