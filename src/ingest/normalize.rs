// src/ingest/normalize.rs
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::ingest::types::{IndicatorRecord, RawResponse};

/// Filter `data` down to objects carrying an `id` and stamp each with the
/// current UTC time.
pub fn normalize(raw: Option<&RawResponse>) -> Vec<IndicatorRecord> {
    normalize_at(raw, Utc::now())
}

/// Same as [`normalize`] with an explicit clock reading.
///
/// Absent input, a missing/null `data`, or a `data` that is not an array
/// (ThreatFox answers "no result" queries with a string there) all yield an
/// empty batch.
pub fn normalize_at(raw: Option<&RawResponse>, now: DateTime<Utc>) -> Vec<IndicatorRecord> {
    let Some(entries) = raw.and_then(RawResponse::data).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => IndicatorRecord::new(fields.clone(), now),
            _ => None,
        })
        .collect()
}
