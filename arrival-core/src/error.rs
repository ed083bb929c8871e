//! Error types for the aggregator core.

use thiserror::Error;

/// Errors surfaced by the provider registry, key codec, cache and fetcher.
///
/// Every variant corresponds to one of the abstract error kinds in the
/// design: `MalformedKey`, `UnknownProvider`/`UnsupportedType`,
/// `ProviderFetchError`, `ProviderConfigError`, `CacheStoreError`,
/// `PublishError`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The key codec rejected a string — fewer than three `:`-separated
    /// segments, an unparseable param pair, or invalid percent-encoding.
    ///
    /// Never raised on the scheduler path: keys there always came from a
    /// provider's own [`build_key`](crate::key::build_key) call.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// No provider is registered under the given id.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A registered provider does not support the subscription's type.
    #[error("provider {provider} does not support type {type_}")]
    UnsupportedType {
        /// The provider that was checked.
        provider: String,
        /// The unsupported subscription type.
        type_: String,
    },

    /// A device was referenced by a synchronous facade call but is not
    /// known to the activity store.
    #[error("device not registered: {0}")]
    UnknownDevice(String),

    /// Transient upstream failure while fetching a key.
    #[error("provider fetch failed: {0}")]
    ProviderFetchError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Upstream credentials or configuration are missing/invalid.
    #[error("provider config error: {0}")]
    ProviderConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The upstream transit API is unreachable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The side-store backing the cache or activity store is unavailable.
    #[error("cache store error: {0}")]
    CacheStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The downstream publish sink rejected a message. Never retried.
    #[error("publish error: {0}")]
    PublishError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors a [`ProviderPlugin`](crate::provider::ProviderPlugin) may return
/// from `fetch`.
///
/// The fetcher folds these into [`EngineError`] for logging and metrics;
/// they never propagate past the scheduler loop that triggered the fetch.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transient upstream failure (timeout, 5xx, malformed response body).
    #[error("fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Missing or invalid provider configuration/credentials.
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The upstream API could not be reached at all.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Fetch(e) => EngineError::ProviderFetchError(e),
            ProviderError::Config(e) => EngineError::ProviderConfigError(e),
            ProviderError::UpstreamUnavailable(e) => EngineError::UpstreamUnavailable(e),
        }
    }
}
