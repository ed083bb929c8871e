#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Data model, key codec, provider plugin contract and error types for the
//! transit-arrival aggregator. See [`arrival-engine`](https://docs.rs/arrival-engine)
//! for the stateful engine that drives these types.

/// Device presence/heartbeat model and the derived activity status.
pub mod activity;
/// Normalized arrival data.
pub mod arrival;
/// The cache entry data type.
pub mod cache;
/// Error types for the aggregator core.
pub mod error;
/// Cache key construction and parsing.
pub mod key;
/// Metric name descriptors.
pub mod metrics;
/// The provider plugin contract.
pub mod provider;
/// The downstream publish sink contract.
pub mod publisher;
/// The side-store contract.
pub mod side_store;
/// The device subscription data model.
pub mod subscription;

pub use activity::{ActivityReason, ActivityStatus, DeviceActivity, DeviceActivityRecord, Presence};
pub use arrival::ArrivalItem;
pub use cache::CacheEntry;
pub use error::{EngineError, ProviderError};
pub use key::{Key, ParsedKey, build_key, parse_key};
pub use provider::{FetchContext, FetchOutcome, LoadSubscriptions, ProviderPlugin};
pub use publisher::{Publisher, device_commands_topic};
pub use side_store::SideStore;
pub use subscription::{DeviceOptions, Subscription};
