//! Timestamp helpers for range-tagged messages.
//!
//! TIC timestamps are RFC 3339 strings. A message can mark a time range
//! with the reserved `starttimestamp`/`endtimestamp` pair; these helpers
//! answer whether a point-in-time reading falls inside it. Unparseable
//! stamps compare as epoch 0.

use crate::node;
use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::debug;

/// Epoch seconds for an RFC 3339 timestamp, 0 when unparseable.
pub fn to_epoch(timestamp: &str) -> i64 {
    if timestamp.is_empty() {
        return 0;
    }
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.timestamp(),
        Err(e) => {
            debug!(timestamp, error = %e, "unparseable timestamp");
            0
        }
    }
}

/// RFC 3339 rendering of epoch seconds (UTC).
pub fn from_epoch(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => String::new(),
    }
}

/// True if `timestamp` lies in `[start, end]`, inclusive on both ends.
pub fn between(start: &str, end: &str, timestamp: &str) -> bool {
    let t = to_epoch(timestamp);
    t >= to_epoch(start) && t <= to_epoch(end)
}

/// True if the object carries both ends of a time range.
pub fn has_timestamp_range(obj: &Map<String, Value>) -> bool {
    node::has(obj, "starttimestamp") && node::has(obj, "endtimestamp")
}

/// True if the object carries a time range containing `timestamp`.
/// Objects without a range never match.
pub fn in_range(obj: &Map<String, Value>, timestamp: &str) -> bool {
    if !has_timestamp_range(obj) {
        return false;
    }
    let start = node::get_str(obj, "starttimestamp").unwrap_or_default();
    let end = node::get_str(obj, "endtimestamp").unwrap_or_default();
    between(&start, &end, timestamp)
}
