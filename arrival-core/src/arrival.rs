//! Normalized arrival data, as produced by providers and consumed by the
//! device-command composer.

use serde::{Deserialize, Deserializer};
use smol_str::SmolStr;

/// Accepts a timestamp as either an ISO 8601 string or a raw epoch-millis
/// number, normalizing to epoch milliseconds.
///
/// Providers are free to emit either shape (both appear among upstream
/// transit APIs); the composer only ever deals in epoch millis.
fn deserialize_timestamp_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(i64),
        Iso8601(String),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        None => None,
        Some(Repr::Millis(ms)) => Some(ms),
        Some(Repr::Iso8601(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
    })
}

/// A single normalized transit arrival, as returned inside a provider's
/// fetch payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalItem {
    /// Scheduled-or-predicted arrival time, epoch milliseconds. Accepts an
    /// ISO 8601 string or a raw millis number on deserialize.
    #[serde(default, deserialize_with = "deserialize_timestamp_ms")]
    pub arrival_time: Option<i64>,
    /// Originally scheduled time, epoch milliseconds, if different from
    /// `arrival_time`.
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_time: Option<i64>,
    /// Delay in seconds, positive meaning late.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<i64>,
    /// Human-readable destination/headsign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<SmolStr>,
    /// Free-form upstream status string (e.g. `"on_time"`, `"cancelled"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SmolStr>,
    /// Direction identifier or label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SmolStr>,
    /// Line/route identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<SmolStr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_time_accepts_epoch_millis_number() {
        let item: ArrivalItem = serde_json::from_value(serde_json::json!({"arrivalTime": 1_735_689_630_000i64})).unwrap();
        assert_eq!(item.arrival_time, Some(1_735_689_630_000));
    }

    #[test]
    fn arrival_time_accepts_iso8601_string() {
        let item: ArrivalItem =
            serde_json::from_value(serde_json::json!({"arrivalTime": "2025-01-01T00:00:30.000Z"})).unwrap();
        assert_eq!(item.arrival_time, Some(1_735_689_630_000));
    }

    #[test]
    fn arrival_time_defaults_to_absent() {
        let item: ArrivalItem = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(item.arrival_time, None);
    }
}
