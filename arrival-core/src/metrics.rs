//! Metric name descriptors for the aggregator.
//!
//! Enable the `metrics` feature to register and emit these. When disabled,
//! [`Timer`] is a zero-sized no-op and the `record_*` helpers elsewhere in
//! the crate compile away entirely.

use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

/// Zero-cost timer for metrics collection.
///
/// When the `metrics` feature is enabled, this captures the start instant.
/// When disabled, this is a zero-sized struct with no overhead.
pub struct Timer {
    #[cfg(feature = "metrics")]
    start: Instant,
}

impl Timer {
    /// Starts a new timer.
    #[inline]
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "metrics")]
            start: Instant::now(),
        }
    }

    /// Elapsed duration since the timer started. `Duration::ZERO` when the
    /// `metrics` feature is disabled.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        #[cfg(feature = "metrics")]
        {
            self.start.elapsed()
        }
        #[cfg(not(feature = "metrics"))]
        {
            Duration::ZERO
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
lazy_static! {
    /// Histogram of per-provider upstream fetch duration, in seconds.
    pub static ref FETCH_DURATION: &'static str = {
        metrics::describe_histogram!(
            "engine_fetch_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of provider.fetch calls in seconds, by provider."
        );
        "engine_fetch_duration_seconds"
    };

    /// Gauge of the current inflight-fetch count.
    pub static ref INFLIGHT: &'static str = {
        metrics::describe_gauge!(
            "engine_inflight",
            "Number of keys with a fetch currently in flight."
        );
        "engine_inflight"
    };

    /// Counter of arrival cache hits.
    pub static ref CACHE_HIT: &'static str = {
        metrics::describe_counter!(
            "engine_cache_hit_total",
            "Total number of arrival cache hits during scheduler refresh."
        );
        "engine_cache_hit_total"
    };

    /// Counter of arrival cache misses.
    pub static ref CACHE_MISS: &'static str = {
        metrics::describe_counter!(
            "engine_cache_miss_total",
            "Total number of arrival cache misses during scheduler refresh."
        );
        "engine_cache_miss_total"
    };

    /// Counter of provider fetch errors, by provider.
    pub static ref FETCH_ERROR: &'static str = {
        metrics::describe_counter!(
            "engine_fetch_error_total",
            "Total number of provider.fetch errors, by provider."
        );
        "engine_fetch_error_total"
    };
}

/// Records a completed fetch's duration and, on failure, bumps the error
/// counter. No-op when the `metrics` feature is disabled.
#[inline]
pub fn record_fetch(provider: &str, timer: Timer, success: bool) {
    #[cfg(feature = "metrics")]
    {
        metrics::histogram!(*FETCH_DURATION, "provider" => provider.to_string())
            .record(timer.elapsed().as_secs_f64());
        if !success {
            metrics::counter!(*FETCH_ERROR, "provider" => provider.to_string()).increment(1);
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = (provider, timer, success);
    }
}

/// Records a cache hit or miss. No-op when the `metrics` feature is
/// disabled.
#[inline]
pub fn record_cache_lookup(hit: bool) {
    #[cfg(feature = "metrics")]
    {
        if hit {
            metrics::counter!(*CACHE_HIT).increment(1);
        } else {
            metrics::counter!(*CACHE_MISS).increment(1);
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = hit;
    }
}

/// Sets the inflight-fetch gauge. No-op when the `metrics` feature is
/// disabled.
#[inline]
pub fn set_inflight(count: usize) {
    #[cfg(feature = "metrics")]
    {
        metrics::gauge!(*INFLIGHT).set(count as f64);
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = count;
    }
}
