//! Time and timestamp utilities

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde_json::{json, Value};

use crate::types::EntryId;

/// Milliseconds since the Unix epoch, clamped at zero
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Get current time information as JSON
pub fn get_current_time() -> Value {
    describe(Utc::now())
}

/// Wall-clock time at which the store assigned `id`
pub fn entry_time(id: &EntryId) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(id.ms).ok()?)
}

fn describe(now: DateTime<Utc>) -> Value {
    json!({
        "timestamp": now.timestamp(),
        "timestamp_ms": now.timestamp_millis(),
        "iso8601": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        "readable": now.format("%A, %-d %B %Y %H:%M:%S UTC").to_string(),
        "components": {
            "year": now.year(),
            "month": now.month(),
            "day": now.day(),
            "hour": now.hour(),
            "minute": now.minute(),
            "second": now.second(),
            "weekday": now.format("%A").to_string()
        }
    })
}
