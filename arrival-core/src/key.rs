//! Cache key construction and parsing.
//!
//! This module provides the canonical *Key* codec described by the
//! aggregator's data model:
//!
//! - [`Key`] — an opaque, cheaply-clonable canonical key string.
//! - [`build_key`] — turns `(providerId, type, params)` into a [`Key`].
//! - [`parse_key`] — the inverse operation.
//!
//! ## Format
//!
//! ```text
//! providerId ":" type ":" k1=v1;k2=v2;...
//! ```
//!
//! Param names are lowercased and sorted ascending; values are trimmed then
//! percent-encoded. `parse_key(build_key(...))` reproduces the input modulo
//! key-name lowercasing and value trimming/percent-encoding.
//!
//! ```
//! use arrival_core::key::{build_key, parse_key};
//!
//! let key = build_key("nextbus", "arrivals", [("Stop", " S "), ("Line", "L1")]);
//! assert_eq!(key.as_str(), "nextbus:arrivals:line=L1;stop=S");
//!
//! let parsed = parse_key(&key).unwrap();
//! assert_eq!(parsed.provider_id, "nextbus");
//! assert_eq!(parsed.type_, "arrivals");
//! assert_eq!(parsed.params.get("stop").map(String::as_str), Some("S"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use smol_str::SmolStr;

use crate::error::EngineError;

/// Characters left unescaped in percent-encoded values, beyond
/// alphanumerics. Kept minimal so the canonical form stays readable.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An opaque, cheaply-clonable cache key.
///
/// `Key` wraps the canonical string form in an [`Arc`] so that copying a key
/// into the fanout map, the reverse-fanout map, and the inflight map costs a
/// single reference-count bump, not a string allocation.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, serde::Serialize)]
pub struct Key(Arc<str>);

impl Key {
    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an already-canonical string as a `Key` without validation.
    ///
    /// Only providers and the codec are expected to call this directly;
    /// everyone else should go through [`build_key`].
    pub fn from_canonical(s: impl Into<Arc<str>>) -> Self {
        Key(s.into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The result of [`parse_key`]: the decomposed parts of a [`Key`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedKey {
    /// Registered provider identifier.
    pub provider_id: SmolStr,
    /// Subscription type, provider-defined (e.g. `"arrivals"`).
    pub type_: SmolStr,
    /// Decoded, lowercased-key parameter map.
    pub params: BTreeMap<String, String>,
}

/// Builds a canonical [`Key`] from `(providerId, type, params)`.
///
/// Param names are lowercased and sorted ascending; values are trimmed and
/// percent-encoded. Duplicate param names (after lowercasing) keep the last
/// occurrence, matching [`BTreeMap`] insertion semantics.
pub fn build_key<I, K, V>(provider_id: &str, type_: &str, params: I) -> Key
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: BTreeMap<String, String> = BTreeMap::new();
    for (k, v) in params {
        sorted.insert(k.as_ref().to_lowercase(), v.as_ref().trim().to_string());
    }

    let mut out = String::with_capacity(provider_id.len() + type_.len() + 16);
    out.push_str(provider_id);
    out.push(':');
    out.push_str(type_);
    out.push(':');
    for (i, (k, v)) in sorted.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(k);
        out.push('=');
        out.extend(percent_encode(v.as_bytes(), VALUE_ENCODE_SET));
    }

    Key(Arc::from(out))
}

/// Parses a [`Key`] back into its `(providerId, type, params)` parts.
///
/// Fails with [`EngineError::MalformedKey`] if the key has fewer than three
/// `:`-separated segments, or if a param segment has no `=`, or if a value
/// is not valid percent-encoded UTF-8.
pub fn parse_key(key: &Key) -> Result<ParsedKey, EngineError> {
    let raw = key.as_str();
    let mut segments = raw.splitn(3, ':');
    let provider_id = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::MalformedKey(raw.to_string()))?;
    let type_ = segments
        .next()
        .ok_or_else(|| EngineError::MalformedKey(raw.to_string()))?;
    let rest = segments
        .next()
        .ok_or_else(|| EngineError::MalformedKey(raw.to_string()))?;

    let mut params = BTreeMap::new();
    if !rest.is_empty() {
        for pair in rest.split(';') {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| EngineError::MalformedKey(raw.to_string()))?;
            let decoded = percent_decode_str(v)
                .decode_utf8()
                .map_err(|_| EngineError::MalformedKey(raw.to_string()))?;
            params.insert(k.to_string(), decoded.into_owned());
        }
    }

    Ok(ParsedKey {
        provider_id: SmolStr::new(provider_id),
        type_: SmolStr::new(type_),
        params,
    })
}
