//! Webhook payload normalization.
//!
//! OpenPhone posts either an event envelope
//! (`{"type": "call.completed", "data": {"object": {...}}}`) or the bare
//! object. Both become one [`RemoteRecord`] for
//! [`SyncOrchestrator::ingest`](syncline_sync::SyncOrchestrator::ingest).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use syncline_sync::{RecordKind, RemoteRecord, SyncError};

use crate::mapping::{call_record, message_record};

/// A normalized webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    /// `call.completed`, `message.received`, ... when the sender named one.
    pub event_type: Option<String>,
    /// Routes the event to a tenant's connection.
    pub phone_number_id: Option<String>,
    pub record: RemoteRecord,
}

fn kind_of_event(event_type: &str) -> Option<RecordKind> {
    let prefix = event_type.split('.').next()?;
    match prefix {
        "call" | "calls" | "callSummary" | "callTranscript" => Some(RecordKind::Call),
        "message" | "messages" => Some(RecordKind::Message),
        _ => None,
    }
}

fn str_of<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Normalize a webhook body.
///
/// `endpoint_kind` is the kind implied by the route the payload arrived on;
/// an explicit event type in the body takes precedence.
pub fn normalize_webhook(
    body: &Value,
    endpoint_kind: Option<RecordKind>,
    observed_at: DateTime<Utc>,
) -> Result<WebhookEvent, SyncError> {
    let envelope = body
        .as_object()
        .ok_or_else(|| SyncError::validation("webhook", "payload is not a JSON object"))?;

    let event_type = str_of(envelope, "type")
        .or_else(|| str_of(envelope, "event"))
        .map(str::to_string);

    let object = envelope
        .get("data")
        .and_then(|d| d.get("object"))
        .and_then(Value::as_object)
        .unwrap_or(envelope);

    let kind = event_type
        .as_deref()
        .and_then(kind_of_event)
        .or(endpoint_kind)
        .ok_or_else(|| {
            SyncError::validation(
                "webhook",
                format!(
                    "cannot tell call from message for event '{}'",
                    event_type.as_deref().unwrap_or("unknown")
                ),
            )
        })?;

    let record = match kind {
        RecordKind::Call => call_record(object, observed_at),
        RecordKind::Message => message_record(object, observed_at),
        other => {
            return Err(SyncError::validation(
                "webhook",
                format!("{other} events are not accepted"),
            ))
        }
    }
    .ok_or_else(|| SyncError::validation(format!("{kind}"), "webhook object has no id"))?;

    let phone_number_id = str_of(object, "phoneNumberId")
        .or_else(|| str_of(object, "phoneNumber"))
        .map(str::to_string);

    Ok(WebhookEvent {
        event_type,
        phone_number_id,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_call_event() {
        let body = json!({
            "id": "EV1",
            "type": "call.completed",
            "data": {"object": {
                "id": "AC9",
                "phoneNumberId": "PN1",
                "status": "completed",
                "duration": 30
            }}
        });
        let event = normalize_webhook(&body, None, Utc::now()).unwrap();
        assert_eq!(event.event_type.as_deref(), Some("call.completed"));
        assert_eq!(event.phone_number_id.as_deref(), Some("PN1"));
        assert_eq!(event.record.kind, RecordKind::Call);
        assert_eq!(event.record.external_id, "AC9");
    }

    #[test]
    fn test_flat_payload_uses_endpoint_kind() {
        let body = json!({"id": "MS4", "phoneNumber": "+15550100", "text": "hi"});
        let event = normalize_webhook(&body, Some(RecordKind::Message), Utc::now()).unwrap();
        assert_eq!(event.record.kind, RecordKind::Message);
        assert_eq!(event.phone_number_id.as_deref(), Some("+15550100"));
    }

    #[test]
    fn test_event_type_overrides_endpoint() {
        let body = json!({"event": "message.status_changed", "id": "MS5", "status": "delivered"});
        let event = normalize_webhook(&body, Some(RecordKind::Call), Utc::now()).unwrap();
        assert_eq!(event.record.kind, RecordKind::Message);
    }

    #[test]
    fn test_payload_without_id_is_validation_error() {
        let body = json!({"type": "call.ringing", "data": {"object": {"status": "ringing"}}});
        let err = normalize_webhook(&body, None, Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let body = json!({"type": "contact.updated", "id": "CT1"});
        assert!(normalize_webhook(&body, None, Utc::now()).is_err());
        assert!(normalize_webhook(&json!([1, 2]), None, Utc::now()).is_err());
    }
}
