//! Composes a device's cached payloads into the JSON render command
//! published to its `/device/<id>/commands` topic.

use std::sync::Arc;

use arrival_core::arrival::ArrivalItem;
use arrival_core::error::EngineError;
use arrival_core::key::{Key, parse_key};
use arrival_core::publisher::{Publisher, device_commands_topic};
use serde::Serialize;

use crate::cache::ArrivalCache;
use crate::config::MAX_ARRIVALS_PER_LINE;
use crate::fanout::FanoutSnapshot;
use crate::labels::{DirectionLabelResolver, StopLabelResolver};

/// One upcoming arrival, padded to exactly
/// [`MAX_ARRIVALS_PER_LINE`] per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextArrival {
    /// Delay in seconds, positive meaning late.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<i64>,
    /// Human-readable destination/headsign.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Free-form upstream status string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Direction identifier or label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Line/route identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    /// `"DUE"`, `"{n}m"`, or `"--"` if unparseable/missing.
    pub eta: String,
}

impl NextArrival {
    fn placeholder() -> Self {
        NextArrival {
            delay_seconds: None,
            destination: None,
            status: None,
            direction: None,
            line: None,
            eta: "--".to_string(),
        }
    }
}

/// One subscribed line's rendered arrivals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCommand {
    /// Line/route identifier. Lines without one are dropped before this
    /// type is constructed.
    pub line: String,
    /// Direction identifier, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Human-readable direction label, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_label: Option<String>,
    /// Human-readable destination/headsign.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Free-form upstream status string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Exactly [`MAX_ARRIVALS_PER_LINE`] entries, padded with placeholders.
    pub next_arrivals: Vec<NextArrival>,
}

/// The full per-device render command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommand {
    /// Device display mode.
    pub display_type: u32,
    /// Whether the device should scroll between lines.
    pub scrolling: bool,
    /// How many arrivals per line the device should render, in `[1, 3]`.
    pub arrivals_to_display: u8,
    /// Provider id, copied from the first line after sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Human-readable stop name, copied from the first line after sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    /// Stop id, copied from the first line after sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<String>,
    /// Direction, copied from the first line after sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Human-readable direction label, copied from the first line after
    /// sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_label: Option<String>,
    /// Destination, copied from the first line after sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Headline ETA, copied from the first line after sort (see
    /// [`line_headline_eta`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    /// One entry per distinct line, sorted ascending by `line`.
    pub lines: Vec<LineCommand>,
}

struct LineDraft {
    provider_id: String,
    stop_id: Option<String>,
    stop_name: Option<String>,
    headline_eta: String,
    command: LineCommand,
}

/// Gathers the latest cached payloads for a device's keys, normalizes
/// arrivals, derives labels and ETAs, and emits the render command.
pub struct DeviceCommandComposer {
    cache: Arc<ArrivalCache>,
    publisher: Arc<dyn Publisher>,
    stop_labels: Arc<dyn StopLabelResolver>,
    direction_labels: Arc<dyn DirectionLabelResolver>,
}

impl DeviceCommandComposer {
    /// Builds a composer over the given cache, publish sink, and label
    /// resolvers.
    pub fn new(
        cache: Arc<ArrivalCache>,
        publisher: Arc<dyn Publisher>,
        stop_labels: Arc<dyn StopLabelResolver>,
        direction_labels: Arc<dyn DirectionLabelResolver>,
    ) -> Self {
        DeviceCommandComposer {
            cache,
            publisher,
            stop_labels,
            direction_labels,
        }
    }

    /// Composes `device_id`'s render command from the given fanout
    /// snapshot, without publishing it.
    pub async fn compose(
        &self,
        device_id: &str,
        fanout: &FanoutSnapshot,
        now_ms: i64,
    ) -> Result<DeviceCommand, EngineError> {
        let options = fanout.device_options.get(device_id).copied().unwrap_or_default();
        let keys: Vec<Key> = fanout
            .reverse
            .get(device_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        let mut drafts = Vec::new();
        for key in &keys {
            if let Some(draft) = self.compose_line(key, now_ms).await? {
                drafts.push(draft);
            }
        }

        drafts.sort_by(|a, b| a.command.line.to_lowercase().cmp(&b.command.line.to_lowercase()));

        let headline = drafts.first();
        Ok(DeviceCommand {
            display_type: options.display_type,
            scrolling: options.scrolling,
            arrivals_to_display: options.arrivals_to_display,
            provider: headline.map(|d| d.provider_id.clone()),
            stop: headline.and_then(|d| d.stop_name.clone()),
            stop_id: headline.and_then(|d| d.stop_id.clone()),
            direction: headline.and_then(|d| d.command.direction.clone()),
            direction_label: headline.and_then(|d| d.command.direction_label.clone()),
            destination: headline.and_then(|d| d.command.destination.clone()),
            eta: headline.map(|d| d.headline_eta.clone()),
            lines: drafts.into_iter().map(|d| d.command).collect(),
        })
    }

    /// Composes and publishes `device_id`'s render command to its topic.
    pub async fn compose_and_publish(
        &self,
        device_id: &str,
        fanout: &FanoutSnapshot,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let command = self.compose(device_id, fanout, now_ms).await?;
        let payload = serde_json::to_value(&command).map_err(|e| EngineError::PublishError(Box::new(e)))?;
        self.publisher.publish(&device_commands_topic(device_id), payload).await
    }

    async fn compose_line(&self, key: &Key, now_ms: i64) -> Result<Option<LineDraft>, EngineError> {
        let Some(entry) = self.cache.get_raw(key).await? else {
            return Ok(None);
        };
        let Ok(parsed) = parse_key(key) else {
            return Ok(None);
        };
        let payload_obj = entry.payload.as_ref().and_then(|v| v.as_object());

        let str_field = |name: &str| {
            payload_obj
                .and_then(|o| o.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let Some(line_id) = str_field("line").or_else(|| parsed.params.get("line").cloned()) else {
            return Ok(None); // step 6: drop the line entirely without a line value.
        };

        let stop_id = str_field("stopId")
            .or_else(|| parsed.params.get("stopid").cloned())
            .or_else(|| parsed.params.get("stop").cloned());
        let stop_name = str_field("stop")
            .or_else(|| stop_id.as_deref().and_then(|id| self.stop_labels.resolve_stop_name(id)));

        let direction = str_field("direction").or_else(|| parsed.params.get("direction").cloned());
        let direction_label = str_field("directionLabel").or_else(|| {
            self.direction_labels
                .resolve_direction_label(Some(&line_id), direction.as_deref(), stop_id.as_deref())
        });
        let destination = str_field("destination");
        let status = str_field("status");

        let arrivals: Vec<ArrivalItem> = payload_obj
            .and_then(|o| o.get("arrivals"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let mut next_arrivals = Vec::with_capacity(MAX_ARRIVALS_PER_LINE);
        let mut etas = Vec::with_capacity(MAX_ARRIVALS_PER_LINE);
        for item in arrivals.iter().take(MAX_ARRIVALS_PER_LINE) {
            let eta = compute_eta(item.arrival_time, entry.fetched_at);
            etas.push(eta.clone());
            next_arrivals.push(NextArrival {
                delay_seconds: item.delay_seconds,
                destination: item.destination.as_ref().map(|s| s.to_string()),
                status: item.status.as_ref().map(|s| s.to_string()),
                direction: item.direction.as_ref().map(|s| s.to_string()),
                line: item.line.as_ref().map(|s| s.to_string()),
                eta,
            });
        }
        while next_arrivals.len() < MAX_ARRIVALS_PER_LINE {
            next_arrivals.push(NextArrival::placeholder());
        }
        next_arrivals.truncate(MAX_ARRIVALS_PER_LINE);

        let _ = now_ms; // baseline is always fetchedAt in this port; kept for signature symmetry with the cache read.

        Ok(Some(LineDraft {
            provider_id: parsed.provider_id.to_string(),
            stop_id,
            stop_name,
            headline_eta: line_headline_eta(&etas),
            command: LineCommand {
                line: line_id,
                direction,
                direction_label,
                destination,
                status,
                next_arrivals,
            },
        }))
    }
}

/// `diffSec = max(0, floor((arrivalMs - fetchedAtMs) / 1000))`,
/// `mins = ceil(diffSec / 60)`, `"DUE"` if `mins <= 1`, else `"{mins}m"`;
/// `"--"` if `arrival_ms` is absent.
fn compute_eta(arrival_ms: Option<i64>, fetched_at_ms: i64) -> String {
    let Some(arrival_ms) = arrival_ms else {
        return "--".to_string();
    };
    let diff_sec = ((arrival_ms - fetched_at_ms) / 1000).max(0);
    let mins = (diff_sec + 59) / 60;
    if mins <= 1 { "DUE".to_string() } else { format!("{mins}m") }
}

/// The first ETA in `etas` that isn't `"DUE"`; falls back to `"DUE"` if at
/// least one entry is parseable (all `"DUE"`), else `"--"`.
fn line_headline_eta(etas: &[String]) -> String {
    if let Some(concrete) = etas.iter().find(|eta| eta.as_str() != "DUE" && eta.as_str() != "--") {
        return concrete.clone();
    }
    if let Some(due) = etas.iter().find(|eta| eta.as_str() == "DUE") {
        return due.clone();
    }
    "--".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemorySideStore;
    use crate::labels::NoopLabelResolver;
    use arrival_core::key::build_key;
    use arrival_test::RecordingPublisher;
    use serde_json::json;
    use smol_str::SmolStr;

    fn composer() -> (DeviceCommandComposer, Arc<ArrivalCache>, Arc<RecordingPublisher>) {
        let cache = Arc::new(ArrivalCache::new(Arc::new(InMemorySideStore::new())));
        let publisher = Arc::new(RecordingPublisher::new());
        let composer = DeviceCommandComposer::new(
            cache.clone(),
            publisher.clone(),
            Arc::new(NoopLabelResolver),
            Arc::new(NoopLabelResolver),
        );
        (composer, cache, publisher)
    }

    fn single_key_fanout(device: &str, key: &Key) -> FanoutSnapshot {
        let mut fanout = FanoutSnapshot::default();
        fanout
            .fanout
            .entry(key.clone())
            .or_default()
            .insert(SmolStr::new(device));
        fanout
            .reverse
            .entry(SmolStr::new(device))
            .or_default()
            .insert(key.clone());
        fanout
    }

    #[tokio::test]
    fn eta_rendering_matches_scenario() {
        let (composer, cache, _publisher) = composer();
        let key = build_key("p", "arrivals", [("line", "L"), ("stop", "S")]);
        let fetched_at = 1_735_689_600_000i64; // 2025-01-01T00:00:00Z
        cache
            .set(
                &key,
                json!({
                    "line": "L",
                    "arrivals": [
                        {"arrivalTime": fetched_at + 30_000},
                        {"arrivalTime": fetched_at + 90_000},
                        {"arrivalTime": fetched_at + 600_000},
                    ],
                }),
                15,
                fetched_at,
            )
            .await
            .unwrap();

        let fanout = single_key_fanout("d1", &key);
        let command = composer.compose("d1", &fanout, fetched_at).await.unwrap();

        let line = &command.lines[0];
        let etas: Vec<&str> = line.next_arrivals.iter().map(|a| a.eta.as_str()).collect();
        assert_eq!(etas, vec!["DUE", "2m", "10m"]);
        assert_eq!(command.eta.as_deref(), Some("2m"));
    }

    #[tokio::test]
    fn missing_entries_pad_to_three_with_placeholders() {
        let (composer, cache, _publisher) = composer();
        let key = build_key("p", "arrivals", [("line", "L"), ("stop", "S")]);
        cache.set(&key, json!({"line": "L", "arrivals": []}), 15, 0).await.unwrap();

        let fanout = single_key_fanout("d1", &key);
        let command = composer.compose("d1", &fanout, 0).await.unwrap();

        assert_eq!(command.lines[0].next_arrivals.len(), MAX_ARRIVALS_PER_LINE);
        assert!(command.lines[0].next_arrivals.iter().all(|a| a.eta == "--"));
    }

    #[tokio::test]
    fn line_without_line_value_is_dropped() {
        let (composer, cache, _publisher) = composer();
        let key = build_key("p", "arrivals", [("stop", "S")]);
        cache.set(&key, json!({"arrivals": []}), 15, 0).await.unwrap();

        let fanout = single_key_fanout("d1", &key);
        let command = composer.compose("d1", &fanout, 0).await.unwrap();

        assert!(command.lines.is_empty());
        assert!(command.provider.is_none());
    }

    #[tokio::test]
    fn absent_cache_entry_yields_empty_command_not_an_error() {
        let (composer, _cache, _publisher) = composer();
        let key = build_key("p", "arrivals", [("stop", "S")]);
        let fanout = single_key_fanout("d1", &key);

        let command = composer.compose("d1", &fanout, 0).await.unwrap();
        assert!(command.lines.is_empty());
    }

    #[tokio::test]
    fn lines_sort_ascending_by_line_label() {
        let (composer, cache, _publisher) = composer();
        let key_b = build_key("p", "arrivals", [("line", "B"), ("stop", "S")]);
        let key_a = build_key("p", "arrivals", [("line", "A"), ("stop", "S")]);
        cache.set(&key_b, json!({"line": "B", "arrivals": []}), 15, 0).await.unwrap();
        cache.set(&key_a, json!({"line": "A", "arrivals": []}), 15, 0).await.unwrap();

        let mut fanout = FanoutSnapshot::default();
        for key in [&key_a, &key_b] {
            fanout.fanout.entry(key.clone()).or_default().insert(SmolStr::new("d1"));
            fanout.reverse.entry(SmolStr::new("d1")).or_default().insert(key.clone());
        }

        let command = composer.compose("d1", &fanout, 0).await.unwrap();
        let lines: Vec<&str> = command.lines.iter().map(|l| l.line.as_str()).collect();
        assert_eq!(lines, vec!["A", "B"]);
    }

    #[tokio::test]
    fn compose_and_publish_sends_to_device_topic() {
        let (composer, cache, publisher) = composer();
        let key = build_key("p", "arrivals", [("line", "L"), ("stop", "S")]);
        cache.set(&key, json!({"line": "L", "arrivals": []}), 15, 0).await.unwrap();
        let fanout = single_key_fanout("d1", &key);

        composer.compose_and_publish("d1", &fanout, 0).await.unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "/device/d1/commands");
    }
}
