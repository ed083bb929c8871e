//! Wall-clock helper.
//!
//! Most engine operations take `now_ms` explicitly (see the design's
//! testable properties), so tests can pin time. This module supplies the
//! one spot that reads the real clock.

use chrono::Utc;

/// Current time, epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
