//! Provider-agnostic record envelope produced by fetchers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a remote record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Metric,
    Review,
    Call,
    Message,
    Lead,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Metric => "metric",
            RecordKind::Review => "review",
            RecordKind::Call => "call",
            RecordKind::Message => "message",
            RecordKind::Lead => "lead",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" => Ok(RecordKind::Metric),
            "review" => Ok(RecordKind::Review),
            "call" => Ok(RecordKind::Call),
            "message" => Ok(RecordKind::Message),
            "lead" => Ok(RecordKind::Lead),
            _ => Err(format!("Unknown record kind: {s}")),
        }
    }
}

/// One normalized remote record. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub external_id: String,
    pub kind: RecordKind,
    pub payload: Map<String, Value>,
    pub observed_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn new(
        external_id: impl Into<String>,
        kind: RecordKind,
        payload: Map<String, Value>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            kind,
            payload,
            observed_at,
        }
    }

    /// Identifier used in error lists, e.g. `lead:row-4`.
    #[must_use]
    pub fn record_ref(&self) -> String {
        if self.external_id.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}:{}", self.kind, self.external_id)
        }
    }

    /// Trimmed, non-empty string field. Numbers and booleans are stringified.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integer field; numeric strings are accepted.
    #[must_use]
    pub fn i64_field(&self, key: &str) -> Option<i64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// RFC 3339 timestamp field.
    #[must_use]
    pub fn datetime_field(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.str_field(key)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// List of strings from either a JSON array or a comma-separated string.
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.payload.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => split_list(s),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.payload.get(key).and_then(Value::as_object)
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
