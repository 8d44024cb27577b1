//! OpenPhone API objects to [`RemoteRecord`]s.
//!
//! The raw object is kept under `metadata`; the engine-facing keys are the
//! snake_case names the call and message entities read.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use syncline_sync::{RecordKind, RemoteRecord};
use tracing::warn;

fn text(object: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(Value::from(s.trim())),
        Value::Number(n) => Some(Value::from(n.to_string())),
        // `to` is a list of participants in newer payloads.
        Value::Array(items) => items
            .iter()
            .find_map(Value::as_str)
            .map(|s| Value::from(s.trim())),
        _ => None,
    })
}

fn copy(
    object: &Map<String, Value>,
    payload: &mut Map<String, Value>,
    target: &str,
    sources: &[&str],
) {
    if let Some(value) = text(object, sources) {
        payload.insert(target.to_string(), value);
    }
}

/// The object's `id`, trimmed. Numeric ids are accepted.
#[must_use]
pub fn object_id(object: &Map<String, Value>) -> Option<String> {
    text(object, &["id"]).and_then(|v| v.as_str().map(str::to_string))
}

fn attachment_urls(object: &Map<String, Value>) -> Vec<Value> {
    let Some(Value::Array(items)) = object.get("attachments").or_else(|| object.get("media")) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(url.clone()),
            Value::Object(media) => media.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .map(Value::from)
        .collect()
}

/// Map one call object. `None` when it has no id.
#[must_use]
pub fn call_record(object: &Map<String, Value>, observed_at: DateTime<Utc>) -> Option<RemoteRecord> {
    let Some(id) = object_id(object) else {
        warn!("Dropping OpenPhone call without an id");
        return None;
    };

    let mut payload = Map::new();
    copy(object, &mut payload, "direction", &["direction"]);
    copy(object, &mut payload, "status", &["status"]);
    copy(object, &mut payload, "from", &["from"]);
    copy(object, &mut payload, "to", &["to"]);
    copy(object, &mut payload, "started_at", &["startedAt", "createdAt"]);
    copy(object, &mut payload, "ended_at", &["endedAt", "completedAt"]);
    copy(object, &mut payload, "recording_url", &["recordingUrl"]);
    copy(object, &mut payload, "transcript", &["transcript"]);
    if let Some(duration) = object.get("duration").filter(|d| !d.is_null()) {
        payload.insert("duration".into(), duration.clone());
    }
    payload.insert("metadata".into(), Value::Object(object.clone()));

    Some(RemoteRecord::new(id, RecordKind::Call, payload, observed_at))
}

/// Map one message object. `None` when it has no id.
#[must_use]
pub fn message_record(
    object: &Map<String, Value>,
    observed_at: DateTime<Utc>,
) -> Option<RemoteRecord> {
    let Some(id) = object_id(object) else {
        warn!("Dropping OpenPhone message without an id");
        return None;
    };

    let mut payload = Map::new();
    copy(object, &mut payload, "direction", &["direction"]);
    copy(object, &mut payload, "status", &["status"]);
    copy(object, &mut payload, "from", &["from"]);
    copy(object, &mut payload, "to", &["to"]);
    copy(object, &mut payload, "text", &["text", "body", "content"]);
    copy(object, &mut payload, "sent_at", &["sentAt", "createdAt"]);
    payload.insert("attachments".into(), Value::Array(attachment_urls(object)));
    payload.insert("metadata".into(), Value::Object(object.clone()));

    Some(RemoteRecord::new(id, RecordKind::Message, payload, observed_at))
}
