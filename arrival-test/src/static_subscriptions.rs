//! A [`LoadSubscriptions`] fake returning a fixed, mutable snapshot.

use std::sync::Mutex;

use arrival_core::error::EngineError;
use arrival_core::provider::LoadSubscriptions;
use arrival_core::subscription::Subscription;
use async_trait::async_trait;

/// A `loadSubscriptions` source backed by an in-process, swappable list.
pub struct StaticSubscriptions {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl StaticSubscriptions {
    /// Seeds the source with an initial snapshot.
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        StaticSubscriptions {
            subscriptions: Mutex::new(subscriptions),
        }
    }

    /// Replaces the snapshot returned by subsequent `load_subscriptions`
    /// calls.
    pub fn set(&self, subscriptions: Vec<Subscription>) {
        *self.subscriptions.lock().unwrap() = subscriptions;
    }
}

#[async_trait]
impl LoadSubscriptions for StaticSubscriptions {
    async fn load_subscriptions(&self) -> Result<Vec<Subscription>, EngineError> {
        Ok(self.subscriptions.lock().unwrap().clone())
    }
}
