#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Cache, scheduler, fanout, and composer: the stateful half of the
//! transit-arrival aggregator.

/// Device presence/heartbeat store and derived activity gate.
pub mod activity_store;
/// The typed arrival cache.
pub mod cache;
/// Wall-clock helper.
pub mod clock;
/// Device-command composer.
pub mod composer;
/// Engine configuration.
pub mod config;
/// The `Engine` facade.
pub mod engine;
/// Fanout map builder.
pub mod fanout;
/// The single-flight fetcher.
pub mod fetcher;
/// In-process `SideStore` implementation.
pub mod in_memory_store;
/// GTFS-style label resolver traits.
pub mod labels;
/// The provider registry.
pub mod registry;
/// The refresh/push scheduler loops.
pub mod scheduler;

pub use activity_store::DeviceActivityStore;
pub use cache::ArrivalCache;
pub use composer::{DeviceCommand, DeviceCommandComposer, LineCommand, NextArrival};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use fanout::{FanoutSnapshot, build_fanout};
pub use fetcher::{FetchCompletionHandler, SingleFlightFetcher};
pub use in_memory_store::InMemorySideStore;
pub use labels::{DirectionLabelResolver, NoopLabelResolver, StopLabelResolver};
pub use registry::ProviderRegistry;
