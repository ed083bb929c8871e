//! The side-store contract backing the arrival cache and activity store.
//!
//! A `SideStore` is a namespaced key-value store with per-key TTL. It is the
//! one abstraction the engine depends on for all persistent-ish state;
//! everything else (fanout, inflight) lives purely in process memory. An
//! out-of-process implementation (Redis, etc.) is expected to satisfy the
//! same contract — see [`crate::cache::ArrivalCache`] invariants.

use async_trait::async_trait;

use crate::error::EngineError;

/// Namespace prefix for arrival cache entries.
pub const PREFIX_ARRIVALS_CACHE: &str = "arrivals-cache:";
/// Namespace prefix for provider-scoped key-value storage.
pub const PREFIX_PROVIDER: &str = "provider:";

/// Namespace prefix for a device's presence record.
pub fn device_presence_key(device_id: &str) -> String {
    format!("device:activity:{device_id}:presence")
}

/// Namespace prefix for a device's last-heartbeat timestamp.
pub fn device_last_seen_key(device_id: &str) -> String {
    format!("device:activity:{device_id}:last_seen_ms")
}

/// Namespace prefix for a device's cached "is active" flag.
pub fn device_active_key(device_id: &str) -> String {
    format!("device:active:{device_id}")
}

/// A namespaced key-value store with per-key TTL.
///
/// Implementations must provide atomic per-key reads and writes; the engine
/// relies on that plus the single-flight discipline (§4.4 of the design) to
/// guarantee total ordering of writes for any one key. They need not provide
/// any cross-key atomicity.
#[async_trait]
pub trait SideStore: Send + Sync {
    /// Reads a value. Returns `Ok(None)` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Writes a value with a TTL in whole seconds. `ttl_seconds == 0` means
    /// no expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), EngineError>;

    /// Deletes a value. A no-op (not an error) if the key is absent.
    async fn del(&self, key: &str) -> Result<(), EngineError>;

    /// Batched read. The output vector has the same length and order as
    /// `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Batched write. Each entry is `(key, value, ttl_seconds)`.
    async fn mset(&self, entries: Vec<(String, Vec<u8>, u64)>) -> Result<(), EngineError> {
        for (key, value, ttl) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    /// Whether a (non-expired) value exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool, EngineError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Lists keys under a prefix. Implementations backed by a store without
    /// native prefix scan may approximate this; the engine only uses it for
    /// diagnostics, never on the hot path.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, EngineError>;
}
