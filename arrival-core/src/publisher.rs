//! The downstream publish sink contract.

use async_trait::async_trait;

use crate::error::EngineError;

/// Builds the topic a device's render commands are published to.
pub fn device_commands_topic(device_id: &str) -> String {
    format!("/device/{device_id}/commands")
}

/// Fire-and-forget downstream publish sink.
///
/// At-most-once: a failed `publish` is logged by the caller and never
/// retried, matching the design's *PublishError* handling.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EngineError>;
}
