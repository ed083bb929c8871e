#![doc = include_str!("../README.md")]

mod fake_provider;
mod fixtures;
mod recording_publisher;
mod static_subscriptions;

pub use fake_provider::FakeProvider;
pub use fixtures::subscription;
pub use recording_publisher::RecordingPublisher;
pub use static_subscriptions::StaticSubscriptions;
