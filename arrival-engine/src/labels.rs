//! Narrow interfaces to the GTFS-static lookup helpers the composer falls
//! back on when a provider payload doesn't carry a human-readable label.
//!
//! These are pure, synchronous, out-of-scope collaborators — the engine
//! ships a default that never resolves anything, so an embedder that has
//! no static GTFS data still gets correct (if sparser) device commands.

/// Resolves a stop id to a human-readable stop name.
pub trait StopLabelResolver: Send + Sync {
    /// Looks up the display name for `stop_id`, if known.
    fn resolve_stop_name(&self, stop_id: &str) -> Option<String>;
}

/// Resolves `(line, direction, stop)` to a human-readable direction label
/// (e.g. `"Downtown"`, `"Outbound"`).
pub trait DirectionLabelResolver: Send + Sync {
    /// Looks up a direction label, given whatever of `line`/`direction`/
    /// `stop_id` is available.
    fn resolve_direction_label(
        &self,
        line: Option<&str>,
        direction: Option<&str>,
        stop_id: Option<&str>,
    ) -> Option<String>;
}

/// A resolver pair that never resolves anything.
///
/// Used when the engine is constructed without a GTFS-backed embedder; the
/// composer falls back to the payload/key-derived values alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLabelResolver;

impl StopLabelResolver for NoopLabelResolver {
    fn resolve_stop_name(&self, _stop_id: &str) -> Option<String> {
        None
    }
}

impl DirectionLabelResolver for NoopLabelResolver {
    fn resolve_direction_label(
        &self,
        _line: Option<&str>,
        _direction: Option<&str>,
        _stop_id: Option<&str>,
    ) -> Option<String> {
        None
    }
}
