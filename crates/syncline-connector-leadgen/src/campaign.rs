//! Leadgen service campaign results.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use syncline_sync::{RecordKind, RemoteRecord};

/// Value written to a campaign lead's `source`.
pub const CAMPAIGN_SOURCE: &str = "leadgen_service";

/// Name used when a lead has no legal entity name.
const UNKNOWN_NAME: &str = "Unknown";

/// `GET /api/campaigns/{id}` body. Only `leads` matters for sync.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CampaignResponse {
    #[serde(default)]
    pub campaign_id: Option<Value>,
    #[serde(default)]
    pub leads: Option<Vec<Value>>,
}

/// Human label for a leadgen vertical.
#[must_use]
pub fn vertical_label(vertical: &str) -> String {
    match vertical {
        "local_services" => "Local Services".to_string(),
        "b2b_saas" => "B2B SaaS".to_string(),
        "ecommerce" => "E-commerce".to_string(),
        "healthcare" => "Healthcare".to_string(),
        "real_estate" => "Real Estate".to_string(),
        "other" => "Other".to_string(),
        other => {
            let spaced = other.replace('_', " ");
            let mut chars = spaced.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `value` of the entry whose `type` is `preferred`, else of the first entry.
fn pick_contact(entries: Option<&Value>, preferred: &str) -> Option<String> {
    let entries = entries?.as_array()?;
    entries
        .iter()
        .find(|e| e.get("type").and_then(Value::as_str) == Some(preferred))
        .or_else(|| entries.first())
        .and_then(|e| text(e.get("value")))
}

/// Normalize one campaign lead into a `lead` record.
///
/// `position` (1-based) keys leads that carry no `id` of their own.
#[must_use]
pub fn campaign_lead_record(
    lead: &Map<String, Value>,
    position: usize,
    campaign_id: &str,
    observed_at: DateTime<Utc>,
) -> RemoteRecord {
    let external_id = text(lead.get("id")).unwrap_or_else(|| format!("lead-{position}"));
    let legal_name = text(lead.get("legal_entity").and_then(|e| e.get("name")));
    let address = lead.get("address");
    let vertical = text(lead.get("vertical"));
    let lead_score = text(lead.get("lead_score"));

    let mut payload = Map::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            payload.insert(key.into(), Value::from(value));
        }
    };
    put("email", pick_contact(lead.get("emails"), "personal"));
    put("phone", pick_contact(lead.get("phones"), "main"));
    put(
        "full_name",
        Some(legal_name.clone().unwrap_or_else(|| UNKNOWN_NAME.to_string())),
    );
    put("firm", legal_name);
    put("website", text(lead.get("website")));
    put("city", text(address.and_then(|a| a.get("city"))));
    put("state", text(address.and_then(|a| a.get("region"))));
    put("zip_code", text(address.and_then(|a| a.get("postal"))));

    let mut message = String::from("Imported from leadgen service");
    if let Some(vertical) = &vertical {
        message.push_str(&format!(" - Vertical: {vertical}"));
    }
    if let Some(score) = &lead_score {
        message.push_str(&format!(" - Lead Score: {score}"));
    }
    put("message", Some(message));
    put("source", Some(CAMPAIGN_SOURCE.to_string()));

    let mut practice_areas: Vec<String> = vertical.iter().map(|v| vertical_label(v)).collect();
    if let Some(tags) = lead.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(|t| text(Some(t))) {
            if !practice_areas.contains(&tag) {
                practice_areas.push(tag);
            }
        }
    }
    payload.insert("practice_areas".into(), Value::from(practice_areas));

    let reviews = lead.get("reviews");
    let mut meta = Map::new();
    meta.insert("campaign_id".into(), Value::from(campaign_id));
    meta.insert("lead_score".into(), lead.get("lead_score").cloned().unwrap_or(Value::Null));
    meta.insert("vertical".into(), lead.get("vertical").cloned().unwrap_or(Value::Null));
    meta.insert(
        "rating".into(),
        reviews.and_then(|r| r.get("rating")).cloned().unwrap_or(Value::Null),
    );
    meta.insert(
        "review_count".into(),
        reviews.and_then(|r| r.get("count")).cloned().unwrap_or(Value::Null),
    );
    meta.insert("leadgen_data".into(), Value::Object(lead.clone()));
    payload.insert("sync_metadata".into(), Value::Object(meta));

    RemoteRecord::new(external_id, RecordKind::Lead, payload, observed_at)
}
