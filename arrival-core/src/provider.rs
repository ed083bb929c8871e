//! The provider plugin contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, ProviderError};
use crate::key::{Key, ParsedKey, build_key, parse_key};
use crate::side_store::SideStore;

/// Context handed to [`ProviderPlugin::fetch`].
pub struct FetchContext {
    /// Current time, epoch milliseconds, as observed by the caller.
    pub now_ms: i64,
    /// The key being fetched.
    pub key: Key,
    /// Provider-scoped key-value storage (the `provider:` side-store
    /// namespace), for providers that need to stash auth tokens, ETags,
    /// pagination cursors, etc. between fetches.
    pub provider_kv: Arc<dyn SideStore>,
}

impl FetchContext {
    /// Namespaces a provider-local key under this provider's slice of the
    /// shared `provider:` side-store prefix.
    pub fn scoped_key(&self, provider_id: &str, local_key: &str) -> String {
        format!(
            "{}{provider_id}:{local_key}",
            crate::side_store::PREFIX_PROVIDER
        )
    }
}

/// The result of a successful [`ProviderPlugin::fetch`] call.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The normalized payload to store in the arrival cache.
    pub payload: serde_json::Value,
    /// How long the payload should be considered fresh, in seconds.
    pub ttl_seconds: u64,
}

/// Adapter that knows how to turn a `(type, config)` pair into a [`Key`] and
/// how to fetch live data for that key from an upstream transit API.
///
/// Implementations are expected to be cheap to clone (wrap state in `Arc`
/// internally if needed) since the registry hands out `Arc<dyn
/// ProviderPlugin>` to every caller.
#[async_trait]
pub trait ProviderPlugin: Send + Sync {
    /// The identifier this provider is registered under.
    fn provider_id(&self) -> &str;

    /// Whether this provider handles the given subscription type.
    fn supports(&self, type_: &str) -> bool;

    /// Builds a canonical [`Key`] for a `(type, config)` pair.
    ///
    /// The default implementation delegates to
    /// [`build_key`](crate::key::build_key) using [`provider_id`]; override
    /// only if a provider needs a non-standard key shape.
    fn to_key(&self, type_: &str, config: &BTreeMap<String, String>) -> Key {
        build_key(self.provider_id(), type_, config.iter())
    }

    /// Parses a [`Key`] back into its `(type, params)` parts.
    ///
    /// The default implementation delegates to
    /// [`parse_key`](crate::key::parse_key).
    fn parse_key(&self, key: &Key) -> Result<ParsedKey, EngineError> {
        parse_key(key)
    }

    /// Fetches live data for `key` from the upstream transit API.
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchOutcome, ProviderError>;
}

/// The external subscription-source callable.
///
/// Must be safe to call repeatedly and return a complete snapshot each
/// time; the engine never diffs against a previous call.
#[async_trait]
pub trait LoadSubscriptions: Send + Sync {
    /// Returns the current complete set of subscriptions.
    async fn load_subscriptions(&self) -> Result<Vec<crate::subscription::Subscription>, EngineError>;
}
