//! The six end-to-end scenarios and the universal invariants from the
//! aggregator design, driven against the real `Engine` facade.

use std::sync::Arc;

use arrival_core::key::build_key;
use arrival_engine::{DeviceActivityStore, Engine, EngineBuilder, EngineConfig, InMemorySideStore, ProviderRegistry};
use arrival_test::{FakeProvider, RecordingPublisher, StaticSubscriptions, subscription};
use chrono::Utc;
use serde_json::json;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wires an engine whose activity store is also reachable directly, so
/// tests can seed device heartbeats without going through the facade.
struct Harness {
    engine: Arc<Engine>,
    activity: DeviceActivityStore,
    publisher: Arc<RecordingPublisher>,
    provider: Arc<FakeProvider>,
}

fn harness(provider: FakeProvider, subscriptions: Vec<arrival_core::subscription::Subscription>) -> Harness {
    let registry = Arc::new(ProviderRegistry::new());
    let provider = Arc::new(provider);
    registry.register(provider.clone());

    let activity_store = Arc::new(InMemorySideStore::new());
    let activity = DeviceActivityStore::new(activity_store.clone(), 60_000);

    let publisher = Arc::new(RecordingPublisher::new());
    let load_subscriptions = Arc::new(StaticSubscriptions::new(subscriptions));

    let engine = EngineBuilder::new(load_subscriptions, publisher.clone(), registry, EngineConfig::default())
        .activity_store(activity_store)
        .build();

    Harness {
        engine,
        activity,
        publisher,
        provider,
    }
}

#[tokio::test]
async fn cold_start_one_device_one_key() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(
        json!({"line": "L", "arrivals": [{"arrivalTime": now_ms() + 120_000}]}),
        15,
    );
    let subs = vec![subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")])];
    let harness = harness(provider, subs);
    harness.activity.record_heartbeat("D1", 0).await.unwrap();

    harness.engine.ready().await;

    let published = harness.publisher.published_to("/device/D1/commands");
    assert_eq!(published.len(), 1);
    let line = &published[0]["lines"][0];
    assert_eq!(line["line"], "L");
    assert_eq!(line["nextArrivals"][0]["eta"], "2m");
    assert_eq!(line["nextArrivals"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn dedup_across_devices() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"line": "L", "arrivals": []}), 15);
    let subs = vec![
        subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")]),
        subscription("D2", "p", "arrivals", &[("line", "L"), ("stop", "S")]),
    ];
    let harness = harness(provider, subs);
    harness.activity.record_heartbeat("D1", 0).await.unwrap();
    harness.activity.record_heartbeat("D2", 0).await.unwrap();

    harness.engine.ready().await;

    assert_eq!(harness.provider.call_count(), 1);
    assert_eq!(harness.publisher.published_to("/device/D1/commands").len(), 1);
    assert_eq!(harness.publisher.published_to("/device/D2/commands").len(), 1);
}

#[tokio::test]
async fn inactive_device_gate() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"line": "L", "arrivals": []}), 15);
    let subs = vec![
        subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")]),
        subscription("D2", "p", "arrivals", &[("line", "L"), ("stop", "S")]),
    ];
    let harness = harness(provider, subs);
    // D1 never gets a heartbeat: stays "unknown", not active.
    harness.activity.record_heartbeat("D2", 0).await.unwrap();

    harness.engine.ready().await;

    // The fetch still ran, since D2 is active on the shared key...
    assert_eq!(harness.provider.call_count(), 1);
    // ...but only D2 received a publish.
    assert_eq!(harness.publisher.published_to("/device/D1/commands").len(), 0);
    assert_eq!(harness.publisher.published_to("/device/D2/commands").len(), 1);
}

#[tokio::test]
async fn failure_then_recovery() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_err();
    let subs = vec![subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")])];
    let harness = harness(provider, subs);
    harness.activity.record_heartbeat("D1", 0).await.unwrap();

    harness.engine.ready().await;
    assert_eq!(harness.publisher.count(), 0);

    harness.engine.refresh_device("D1").await.unwrap();
    assert_eq!(harness.publisher.published_to("/device/D1/commands").len(), 1);
}

#[tokio::test]
async fn expire_and_refresh() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"line": "L", "arrivals": []}), 15);
    let subs = vec![subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")])];
    let harness = harness(provider, subs);
    harness.activity.record_heartbeat("D1", 0).await.unwrap();

    harness.engine.ready().await;
    assert_eq!(harness.publisher.count(), 1);

    let key = build_key("p", "arrivals", [("line", "L"), ("stop", "S")]);
    harness.engine.refresh_key(&key).await.unwrap();

    assert_eq!(harness.publisher.count(), 2);
    assert_eq!(harness.provider.call_count(), 2);
}

#[tokio::test]
async fn eta_rendering_exact_values() {
    let baseline = now_ms();
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(
        json!({
            "line": "L",
            "arrivals": [
                {"arrivalTime": baseline + 30_000},
                {"arrivalTime": baseline + 90_000},
                {"arrivalTime": baseline + 600_000},
            ],
        }),
        15,
    );
    let subs = vec![subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")])];
    let harness = harness(provider, subs);
    harness.activity.record_heartbeat("D1", 0).await.unwrap();

    harness.engine.ready().await;

    let published = harness.publisher.published_to("/device/D1/commands");
    let command = &published[0];
    let etas: Vec<&str> = command["lines"][0]["nextArrivals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["eta"].as_str().unwrap())
        .collect();
    assert_eq!(etas, vec!["DUE", "2m", "10m"]);
    assert_eq!(command["eta"], "2m");
}

#[tokio::test]
async fn active_gating_with_all_devices_inactive_issues_zero_fetches() {
    let provider = FakeProvider::new("p", ["arrivals"]).with_fetch_ok(json!({"line": "L", "arrivals": []}), 15);
    let subs = vec![subscription("D1", "p", "arrivals", &[("line", "L"), ("stop", "S")])];
    let harness = harness(provider, subs);
    // No heartbeat recorded for D1 at all.

    harness.engine.ready().await;

    assert_eq!(harness.provider.call_count(), 0);
    assert_eq!(harness.publisher.count(), 0);
}
