//! Engine configuration: refresh/push cadence and the heartbeat timeout.

use arrival_core::activity::{
    DEFAULT_HEARTBEAT_TIMEOUT_MS, MAX_HEARTBEAT_TIMEOUT_MS, MIN_HEARTBEAT_TIMEOUT_MS,
    clamp_heartbeat_timeout_ms,
};

/// Compile-time cap on arrivals rendered per line.
pub const MAX_ARRIVALS_PER_LINE: usize = 3;

/// Default refresh-loop period, in milliseconds.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1_000;

/// Default push-loop period, in milliseconds.
pub const DEFAULT_PUSH_INTERVAL_MS: u64 = 30_000;

/// Tunable knobs for the scheduler and the device-activity gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Refresh-loop period, in milliseconds. Default 1000.
    pub refresh_interval_ms: u64,
    /// Push-loop period, in milliseconds. Default 30000.
    pub push_interval_ms: u64,
    /// Heartbeat timeout, in milliseconds, clamped to `[15000, 300000]`.
    /// Default 60000.
    pub heartbeat_timeout_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            push_interval_ms: DEFAULT_PUSH_INTERVAL_MS,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Starts a builder seeded with the defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a new builder seeded with [`EngineConfig::default`].
    pub fn new() -> Self {
        EngineConfigBuilder {
            config: EngineConfig::default(),
        }
    }

    /// Sets the refresh-loop period.
    pub fn refresh_interval_ms(mut self, ms: u64) -> Self {
        self.config.refresh_interval_ms = ms;
        self
    }

    /// Sets the push-loop period.
    pub fn push_interval_ms(mut self, ms: u64) -> Self {
        self.config.push_interval_ms = ms;
        self
    }

    /// Sets the heartbeat timeout. Clamped to `[MIN_HEARTBEAT_TIMEOUT_MS,
    /// MAX_HEARTBEAT_TIMEOUT_MS]`.
    pub fn heartbeat_timeout_ms(mut self, ms: i64) -> Self {
        self.config.heartbeat_timeout_ms = clamp_heartbeat_timeout_ms(ms);
        self
    }

    /// Builds the [`EngineConfig`].
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.refresh_interval_ms, 1_000);
        assert_eq!(config.push_interval_ms, 30_000);
        assert_eq!(config.heartbeat_timeout_ms, 60_000);
    }

    #[test]
    fn heartbeat_timeout_is_clamped_through_builder() {
        let config = EngineConfig::builder().heartbeat_timeout_ms(1).build();
        assert_eq!(config.heartbeat_timeout_ms, MIN_HEARTBEAT_TIMEOUT_MS);

        let config = EngineConfig::builder()
            .heartbeat_timeout_ms(i64::MAX)
            .build();
        assert_eq!(config.heartbeat_timeout_ms, MAX_HEARTBEAT_TIMEOUT_MS);
    }
}
