// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Field every indicator must carry; the store enforces uniqueness on it.
pub const ID_FIELD: &str = "id";
/// Field stamped onto each record at normalization time.
pub const INGESTED_AT_FIELD: &str = "ingested_at";

/// Parameters of one feed request. Immutable for the whole run.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub endpoint: String,
    pub auth_key: String,
    pub days: u32, // trailing window
}

impl FeedQuery {
    /// JSON body sent on every attempt.
    pub fn body(&self) -> Value {
        serde_json::json!({ "query": "get_iocs", "days": self.days })
    }
}

// Never print the credential itself.
impl std::fmt::Debug for FeedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedQuery")
            .field("endpoint", &self.endpoint)
            .field("auth_key_len", &self.auth_key.len())
            .field("days", &self.days)
            .finish()
    }
}

/// Decoded feed reply. Only constructed when the root is an object holding `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    body: Map<String, Value>,
}

impl RawResponse {
    /// Validate a decoded JSON value. Returns `None` for a non-object root or a
    /// missing `data` field.
    pub fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Object(body) if body.contains_key("data") => Some(Self { body }),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }

    /// Number of entries in `data` when it is an array, else 0.
    pub fn data_len(&self) -> usize {
        self.data()
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// ThreatFox reports e.g. "ok" or "no_result" alongside the data.
    pub fn query_status(&self) -> Option<&str> {
        self.body.get("query_status").and_then(Value::as_str)
    }
}

/// A normalized indicator: upstream fields plus the ingestion timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRecord {
    fields: Map<String, Value>,
    ingested_at: DateTime<Utc>,
}

impl IndicatorRecord {
    /// Build a record from an upstream object. `None` when `id` is missing.
    pub fn new(mut fields: Map<String, Value>, ingested_at: DateTime<Utc>) -> Option<Self> {
        if !fields.contains_key(ID_FIELD) {
            return None;
        }
        // The stamp lives in its own slot; drop any upstream value of the same name.
        fields.remove(INGESTED_AT_FIELD);
        Some(Self {
            fields,
            ingested_at,
        })
    }

    pub fn id(&self) -> &Value {
        // Presence checked in `new`.
        &self.fields[ID_FIELD]
    }

    /// Canonical JSON text of `id`, usable as a map key. Keeps the type, so
    /// `"7"` and `7` are different keys, as under a Mongo unique index.
    pub fn id_key(&self) -> String {
        self.id().to_string()
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Flattened JSON view with `ingested_at` as an RFC 3339 string.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert(
            INGESTED_AT_FIELD.to_string(),
            Value::String(self.ingested_at.to_rfc3339()),
        );
        Value::Object(out)
    }
}
