//! The cache entry data type shared by the arrival cache.

use serde::{Deserialize, Serialize};

/// Minimum residual TTL, in seconds, given to the placeholder entry
/// inserted by `markExpired` when no entry previously existed for a key.
pub const EXPIRE_PLACEHOLDER_TTL_SECONDS: u64 = 5;

/// Minimum TTL, in seconds, enforced on every `set`.
pub const MIN_TTL_SECONDS: u64 = 1;

/// A cached, normalized provider payload plus its freshness window.
///
/// `expires_at == fetched_at` means "expired / placeholder" — the entry
/// exists (so callers can distinguish "never fetched" from "stale") but
/// carries no usable payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Opaque provider payload. `None` for the `markExpired` placeholder.
    pub payload: Option<serde_json::Value>,
    /// When this entry was written, epoch milliseconds.
    pub fetched_at: i64,
    /// When this entry stops being fresh, epoch milliseconds.
    pub expires_at: i64,
}

impl CacheEntry {
    /// Builds a fresh entry for a successful fetch.
    ///
    /// `ttl_seconds` is floored (already whole) and clamped to at least
    /// [`MIN_TTL_SECONDS`].
    pub fn fresh(payload: serde_json::Value, ttl_seconds: u64, now_ms: i64) -> Self {
        let ttl = ttl_seconds.max(MIN_TTL_SECONDS);
        CacheEntry {
            payload: Some(payload),
            fetched_at: now_ms,
            expires_at: now_ms + (ttl as i64) * 1000,
        }
    }

    /// Builds the placeholder entry `markExpired` inserts when no entry
    /// previously existed for a key.
    pub fn expired_placeholder(now_ms: i64) -> Self {
        CacheEntry {
            payload: None,
            fetched_at: now_ms,
            expires_at: now_ms,
        }
    }

    /// Returns a copy of this entry with `expires_at` forced to `now_ms`,
    /// as `markExpired` does for an existing entry.
    pub fn expire_at(&self, now_ms: i64) -> Self {
        CacheEntry {
            payload: self.payload.clone(),
            fetched_at: self.fetched_at,
            expires_at: now_ms,
        }
    }

    /// Whether this entry is expired as of `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_floors_and_clamps_ttl() {
        let entry = CacheEntry::fresh(json!({"ok": true}), 0, 1_000);
        assert_eq!(entry.expires_at, 1_000 + 1_000);

        let entry = CacheEntry::fresh(json!({"ok": true}), 15, 1_000);
        assert_eq!(entry.expires_at, 1_000 + 15_000);
    }

    #[test]
    fn expired_placeholder_has_equal_fetched_and_expires() {
        let entry = CacheEntry::expired_placeholder(500);
        assert_eq!(entry.fetched_at, entry.expires_at);
        assert!(entry.is_expired(500));
    }

    #[test]
    fn expire_at_forces_expiry_without_future_travel() {
        let fresh = CacheEntry::fresh(json!(1), 60, 0);
        let expired = fresh.expire_at(10);
        assert_eq!(expired.expires_at, 10);
        assert!(expired.is_expired(10));
    }
}
