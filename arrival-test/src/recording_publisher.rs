//! A [`Publisher`] that records every publish for later assertion.

use std::sync::Mutex;

use arrival_core::error::EngineError;
use arrival_core::publisher::Publisher;
use async_trait::async_trait;

/// Collects every `(topic, payload)` pair published to it, in order.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingPublisher {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        RecordingPublisher::default()
    }

    /// Returns a snapshot of everything published so far, in publish order.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }

    /// Returns the payloads published to `topic`, in publish order.
    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Total number of publishes recorded.
    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EngineError> {
        self.published.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }
}
